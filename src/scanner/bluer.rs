//! BlueZ D-Bus backend using bluer.
//!
//! Registers an advertisement monitor that matches the beacon manufacturer
//! prefix, so BlueZ only reports devices that look like beacons. The host
//! stack has already split the advertisement into AD structures; events are
//! forwarded as [`RawEvent::Manufacturer`].

use super::{ChannelSource, EVENT_CHANNEL_BUFFER_SIZE, RawEvent, ScanError};
use crate::decoder::{AD_TYPE_MANUFACTURER_DATA, BEACON_BODY_LEN, BEACON_COMPANY_ID, BEACON_TYPE};
use bluer::monitor::{Monitor, MonitorEvent, Pattern};
use bluer::{Adapter, Address, Session};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::DeviceUnavailable(err.to_string())
    }
}

/// Monitor pattern: company id (little-endian), beacon type, body length.
fn beacon_pattern() -> Pattern {
    let [company_lo, company_hi] = BEACON_COMPANY_ID.to_le_bytes();
    Pattern {
        data_type: AD_TYPE_MANUFACTURER_DATA,
        start_position: 0,
        content: vec![company_lo, company_hi, BEACON_TYPE, BEACON_BODY_LEN],
    }
}

/// Start a BlueZ advertisement monitor for beacon advertisements.
///
/// The monitor task runs until the returned source is dropped.
pub async fn open_source() -> Result<ChannelSource, ScanError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    let monitor_manager = adapter.monitor().await?;
    let mut monitor_handle = monitor_manager
        .register(Monitor {
            patterns: Some(vec![beacon_pattern()]),
            ..Default::default()
        })
        .await?;
    debug!(adapter = adapter.name(), "registered beacon monitor");

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER_SIZE);

    // The task owns all Bluetooth state so it lives as long as the scan
    tokio::spawn(async move {
        let _session = session;
        let _monitor_manager = monitor_manager;

        loop {
            let event = tokio::select! {
                _ = tx.closed() => break,
                event = monitor_handle.next() => event,
            };
            let Some(event) = event else { break };

            if let MonitorEvent::DeviceFound(device_id) = event {
                match read_beacon(&adapter, device_id.device).await {
                    Ok(Some(raw)) => {
                        if tx.send(raw).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(address = %device_id.device, error = %e, "failed to read device"),
                }
            }
        }
    });

    Ok(ChannelSource::new(rx))
}

/// Read the beacon manufacturer data and RSSI of a discovered device.
async fn read_beacon(adapter: &Adapter, address: Address) -> Result<Option<RawEvent>, bluer::Error> {
    let device = adapter.device(address)?;

    let Some(mut manufacturer_data) = device.manufacturer_data().await? else {
        return Ok(None);
    };
    let Some(data) = manufacturer_data.remove(&BEACON_COMPANY_ID) else {
        return Ok(None);
    };
    let rssi = device.rssi().await?;

    Ok(Some(RawEvent::Manufacturer {
        company_id: BEACON_COMPANY_ID,
        data,
        rssi,
    }))
}
