//! Assembled hydrometer reading.

use crate::beacon::BeaconRecord;
use crate::beacon_id::BeaconId;
use serde::Serialize;
use std::time::SystemTime;

/// One temperature and gravity reading from a registered hydrometer.
///
/// Serializes to `{"label": .., "temperature": .., "specific_gravity": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Beacon the reading came from
    #[serde(skip)]
    pub id: BeaconId,
    /// Registry label of the hydrometer
    pub label: String,
    /// Temperature in degrees Fahrenheit, as broadcast
    pub temperature: u16,
    /// Specific gravity (1.000 is water)
    pub specific_gravity: f64,
    /// When the reading was assembled
    #[serde(skip)]
    pub timestamp: SystemTime,
}

impl Reading {
    /// Build a reading from a decoded record and its registry label.
    pub fn assemble(label: &str, record: &BeaconRecord) -> Self {
        Reading {
            id: record.id,
            label: label.to_string(),
            temperature: record.major,
            specific_gravity: gravity_from_thousandths(record.minor),
            timestamp: SystemTime::now(),
        }
    }
}

/// Gravity is broadcast as thousandths: 1035 is 1.035.
pub fn gravity_from_thousandths(raw: u16) -> f64 {
    f64::from(raw) / 1000.0
}
