//! Decoded beacon record.

use crate::beacon_id::BeaconId;

/// One beacon advertisement as decoded from the air.
///
/// For a Tilt the two 16-bit fields carry the measurement:
/// - `major`: temperature in degrees Fahrenheit
/// - `minor`: specific gravity in thousandths (1035 means 1.035)
///
/// Records are created by the decoder and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconRecord {
    /// Proximity identifier advertised by the beacon
    pub id: BeaconId,
    /// First 16-bit field (temperature for a Tilt)
    pub major: u16,
    /// Second 16-bit field (gravity in thousandths for a Tilt)
    pub minor: u16,
    /// Calibrated signal strength at 1 m in dBm, as advertised
    pub tx_power: i8,
    /// Received signal strength in dBm, when the scan source reports it
    pub rssi: Option<i16>,
}
