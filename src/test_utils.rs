use crate::beacon::BeaconRecord;
use crate::beacon_id::BeaconId;

/// Identifier advertised by a black Tilt.
pub const BLACK_ID: BeaconId = BeaconId([
    0xa4, 0x95, 0xbb, 0x30, 0xc5, 0xb1, 0x4b, 0x44, 0xb5, 0x12, 0x13, 0x70, 0xf0, 0x2d, 0x74, 0xde,
]);

/// An identifier outside the Tilt family, distinguished by its last byte.
pub fn foreign_id(tail: u8) -> BeaconId {
    let mut bytes = [0x11; 16];
    bytes[15] = tail;
    BeaconId(bytes)
}

/// Beacon manufacturer data without the company id, tx power -59 dBm.
pub fn beacon_manufacturer_data(id: &BeaconId, major: u16, minor: u16) -> Vec<u8> {
    let mut data = vec![0x02, 0x15];
    data.extend_from_slice(id.as_bytes());
    data.extend_from_slice(&major.to_be_bytes());
    data.extend_from_slice(&minor.to_be_bytes());
    data.push(0xC5);
    data
}

/// One advertising report: a flags structure followed by one manufacturer
/// structure holding `manufacturer_body` (company id included).
pub fn advertising_report(manufacturer_body: &[u8], rssi: u8) -> Vec<u8> {
    let mut ad = vec![0x02, 0x01, 0x06];
    ad.push(manufacturer_body.len() as u8 + 1);
    ad.push(0xFF);
    ad.extend_from_slice(manufacturer_body);

    let mut report = vec![0x00, 0x00, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11];
    report.push(ad.len() as u8);
    report.extend(ad);
    report.push(rssi);
    report
}

/// An advertising report carrying one beacon advertisement.
pub fn beacon_report(id: &BeaconId, major: u16, minor: u16, rssi: u8) -> Vec<u8> {
    let mut body = vec![0x4C, 0x00];
    body.extend(beacon_manufacturer_data(id, major, minor));
    advertising_report(&body, rssi)
}

/// An HCI LE advertising report event holding `reports` back to back.
pub fn reports_event(reports: &[Vec<u8>]) -> Vec<u8> {
    let params: usize = reports.iter().map(Vec::len).sum::<usize>() + 2;
    let mut event = vec![0x04, 0x3E, params as u8, 0x02, reports.len() as u8];
    for report in reports {
        event.extend(report);
    }
    event
}

/// An HCI advertising report event with a single report around
/// `manufacturer_body`. RSSI is -60 dBm.
pub fn report_event(manufacturer_body: &[u8]) -> Vec<u8> {
    reports_event(&[advertising_report(manufacturer_body, 0xC4)])
}

/// A complete HCI event carrying one beacon advertisement.
pub fn beacon_event(id: &BeaconId, major: u16, minor: u16) -> Vec<u8> {
    reports_event(&[beacon_report(id, major, minor, 0xC4)])
}

/// A decoded record with the given RSSI.
pub fn record(id: BeaconId, major: u16, minor: u16, rssi: Option<i16>) -> BeaconRecord {
    BeaconRecord {
        id,
        major,
        minor,
        tx_power: -59,
        rssi,
    }
}
