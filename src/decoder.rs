//! Advertisement decoder for proximity beacons.
//!
//! Turns raw scan events into [`BeaconRecord`]s. Anything that is not a
//! well-formed beacon advertisement decodes to an empty set: in open airspace
//! foreign and truncated packets are the normal case, not an error.
//!
//! # Wire format
//!
//! An HCI LE advertising report event:
//!
//! ```text
//! 04 3E <plen> 02 <num_reports> { <evt_type> <addr_type> <addr:6> <len> <data:len> <rssi> }*
//! ```
//!
//! Inside `data`, AD structures are `<len> <type> <len-1 bytes>`. The beacon
//! is AD type `FF` (manufacturer specific) carrying 25 bytes:
//!
//! ```text
//! 4C 00 | 02 15 | <id:16> | <major:2 BE> | <minor:2 BE> | <tx_power:1>
//! ```

use crate::beacon::BeaconRecord;
use crate::beacon_id::BeaconId;
use crate::scanner::RawEvent;
use thiserror::Error;

pub(crate) const HCI_EVENT_PKT: u8 = 0x04;
pub(crate) const EVT_LE_META_EVENT: u8 = 0x3E;
pub(crate) const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

/// Bluetooth manufacturer-specific data type (AD type 0xFF)
pub const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// Company id under which the beacon format is registered (Apple, 0x004C).
pub const BEACON_COMPANY_ID: u16 = 0x004C;

/// Beacon format type byte following the company id.
pub const BEACON_TYPE: u8 = 0x02;

/// Length of the beacon body: id(16) + major(2) + minor(2) + tx power(1).
pub const BEACON_BODY_LEN: u8 = 0x15;

/// Manufacturer data length after the company id: type + length + body.
const BEACON_DATA_LEN: usize = 2 + BEACON_BODY_LEN as usize;

/// Event header: indicator, event code, parameter length, subevent, report count.
const EVENT_HEADER_LEN: usize = 5;

/// Fixed report prefix: event type, address type, address.
const REPORT_PREFIX_LEN: usize = 8;

/// Report RSSI byte meaning the controller did not measure one.
const RSSI_NOT_AVAILABLE: u8 = 0x7F;

/// Reasons a raw event carries no beacon records.
///
/// These are diagnostics only; the scan loop treats them all as "no records".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer ended before a structure it announced
    #[error("Truncated advertisement: {0}")]
    Truncated(&'static str),
    /// A well-formed HCI packet that is not an LE advertising report
    #[error("Not an LE advertising report")]
    NotAdvertisingReport,
    /// Manufacturer data that is not a beacon frame
    #[error("Not a beacon frame")]
    NotBeacon,
}

/// Decode one raw scan event into zero or more beacon records.
pub fn decode(event: &RawEvent) -> Vec<BeaconRecord> {
    match event {
        RawEvent::Hci(buf) => decode_event(buf),
        RawEvent::Manufacturer {
            company_id,
            data,
            rssi,
        } => decode_manufacturer_data(*company_id, data)
            .map(|record| BeaconRecord {
                rssi: *rssi,
                ..record
            })
            .into_iter()
            .collect(),
    }
}

/// Decode an HCI event buffer, discarding malformed input.
pub fn decode_event(buf: &[u8]) -> Vec<BeaconRecord> {
    try_decode_event(buf).unwrap_or_default()
}

/// Decode an HCI event buffer, reporting why nothing was found.
///
/// Reports that are cut short stop the walk; records decoded from earlier
/// complete reports in the same buffer are still returned.
pub fn try_decode_event(buf: &[u8]) -> Result<Vec<BeaconRecord>, DecodeError> {
    let Some((header, mut rest)) = buf.split_at_checked(EVENT_HEADER_LEN) else {
        return Err(DecodeError::Truncated("event header"));
    };

    let &[packet_type, event_code, _param_len, subevent, num_reports] = header else {
        return Err(DecodeError::Truncated("event header"));
    };
    if packet_type != HCI_EVENT_PKT
        || event_code != EVT_LE_META_EVENT
        || subevent != EVT_LE_ADVERTISING_REPORT
    {
        return Err(DecodeError::NotAdvertisingReport);
    }

    let mut records = Vec::new();
    for _ in 0..num_reports {
        let (ad_data, rssi, tail) = match split_report(rest) {
            Ok(parts) => parts,
            Err(e) if records.is_empty() => return Err(e),
            Err(_) => break,
        };
        records.extend(
            ad_structures(ad_data)
                .filter(|(ad_type, _)| *ad_type == AD_TYPE_MANUFACTURER_DATA)
                .filter_map(|(_, body)| decode_manufacturer_structure(body))
                .map(|record| BeaconRecord { rssi, ..record }),
        );
        rest = tail;
    }

    Ok(records)
}

/// Split one advertising report off the front of `buf`.
///
/// Returns the advertising data, the RSSI (`None` when the controller
/// reports it as unavailable) and the remaining bytes.
fn split_report(buf: &[u8]) -> Result<(&[u8], Option<i16>, &[u8]), DecodeError> {
    let (_prefix, rest) = buf
        .split_at_checked(REPORT_PREFIX_LEN)
        .ok_or(DecodeError::Truncated("report prefix"))?;
    let (&data_len, rest) = rest
        .split_first()
        .ok_or(DecodeError::Truncated("report data length"))?;
    let (ad_data, rest) = rest
        .split_at_checked(usize::from(data_len))
        .ok_or(DecodeError::Truncated("report data"))?;
    let (&rssi, rest) = rest
        .split_first()
        .ok_or(DecodeError::Truncated("report rssi"))?;
    let rssi = (rssi != RSSI_NOT_AVAILABLE).then_some(i16::from(rssi as i8));
    Ok((ad_data, rssi, rest))
}

/// Iterator over `(ad_type, payload)` pairs of an advertising data block.
///
/// Stops at a zero-length structure or one that overruns the block.
fn ad_structures(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut rest = data;
    std::iter::from_fn(move || {
        let (&len, tail) = rest.split_first()?;
        let (structure, tail) = tail.split_at_checked(usize::from(len))?;
        let (&ad_type, payload) = structure.split_first()?;
        rest = tail;
        Some((ad_type, payload))
    })
}

/// Decode a manufacturer AD structure body (company id included).
fn decode_manufacturer_structure(body: &[u8]) -> Option<BeaconRecord> {
    let (company, data) = body.split_at_checked(2)?;
    let company_id = u16::from_le_bytes([company[0], company[1]]);
    decode_manufacturer_data(company_id, data).ok()
}

/// Decode manufacturer data that the host stack already split from its
/// company id, as BlueZ reports it.
///
/// The returned record has no RSSI; the caller knows it, the payload does not.
pub fn decode_manufacturer_data(company_id: u16, data: &[u8]) -> Result<BeaconRecord, DecodeError> {
    if company_id != BEACON_COMPANY_ID {
        return Err(DecodeError::NotBeacon);
    }

    let frame = data
        .get(..BEACON_DATA_LEN)
        .ok_or(DecodeError::Truncated("beacon frame"))?;
    let (marker, body) = frame.split_at(2);
    if marker != [BEACON_TYPE, BEACON_BODY_LEN] {
        return Err(DecodeError::NotBeacon);
    }

    let (id, fields) = body.split_at(BeaconId::LEN);
    let id = BeaconId::from_slice(id).ok_or(DecodeError::Truncated("beacon id"))?;
    let &[major_hi, major_lo, minor_hi, minor_lo, tx_power] = fields else {
        return Err(DecodeError::Truncated("beacon fields"));
    };

    Ok(BeaconRecord {
        id,
        major: u16::from_be_bytes([major_hi, major_lo]),
        minor: u16::from_be_bytes([minor_hi, minor_lo]),
        tx_power: tx_power as i8,
        rssi: None,
    })
}
