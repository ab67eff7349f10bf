//! Scan source abstraction for beacon advertisements.
//!
//! A scan source delivers raw advertisement events in batches, one batch per
//! collection window. Backends own the radio and push events into a channel;
//! [`ChannelSource`] turns that channel into windowed batches.

#[cfg(feature = "bluer")]
pub mod bluer;

#[cfg(feature = "hci")]
pub mod hci;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Error type for scan source operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The Bluetooth adapter could not be opened or configured
    #[error("Bluetooth device unavailable: {0}")]
    DeviceUnavailable(String),
    /// The backend stopped delivering events
    #[error("Scan source closed")]
    SourceClosed,
}

/// One raw advertisement event as delivered by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// A complete HCI event packet, packet indicator byte included.
    Hci(Vec<u8>),
    /// Manufacturer data already extracted by the host Bluetooth stack.
    /// `data` excludes the two company id bytes.
    Manufacturer {
        company_id: u16,
        data: Vec<u8>,
        rssi: Option<i16>,
    },
}

/// Boxed future returned by [`ScanSource::next_batch`].
pub type BatchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<RawEvent>, ScanError>> + Send + 'a>>;

/// A source of raw advertisement batches.
pub trait ScanSource: Send {
    /// Wait for the events that arrive within `window` and return them in
    /// arrival order. A batch may be empty.
    fn next_batch(&mut self, window: Duration) -> BatchFuture<'_>;
}

/// Channel buffer size for raw events between a backend task and its source.
pub const EVENT_CHANNEL_BUFFER_SIZE: usize = 256;

/// Scan source fed by a backend task through an mpsc channel.
///
/// Dropping the source closes the channel, which the backend task treats as
/// a signal to stop scanning.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<RawEvent>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<RawEvent>) -> Self {
        Self { rx }
    }
}

impl ScanSource for ChannelSource {
    fn next_batch(&mut self, window: Duration) -> BatchFuture<'_> {
        Box::pin(collect_batch(&mut self.rx, window))
    }
}

/// Drain `rx` until `window` has elapsed.
///
/// Returns [`ScanError::SourceClosed`] only when the channel is closed and
/// nothing was collected; a partial final batch is still delivered.
pub async fn collect_batch(
    rx: &mut mpsc::Receiver<RawEvent>,
    window: Duration,
) -> Result<Vec<RawEvent>, ScanError> {
    let deadline = Instant::now() + window;
    let mut batch = Vec::new();

    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(event)) => batch.push(event),
            Ok(None) if batch.is_empty() => return Err(ScanError::SourceClosed),
            Ok(None) | Err(_) => return Ok(batch),
        }
    }
}

/// Available scanner backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// BlueZ D-Bus backend (requires bluetoothd daemon)
    #[cfg(feature = "bluer")]
    Bluer,
    /// Raw HCI socket backend (direct kernel access, no daemon required)
    #[cfg(feature = "hci")]
    Hci,
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "hci")]
        return Backend::Hci;
        #[cfg(all(feature = "bluer", not(feature = "hci")))]
        return Backend::Bluer;
        #[cfg(not(any(feature = "bluer", feature = "hci")))]
        compile_error!("At least one backend feature must be enabled");
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "bluer")]
            Backend::Bluer => write!(f, "bluer"),
            #[cfg(feature = "hci")]
            Backend::Hci => write!(f, "hci"),
            #[cfg(not(any(feature = "bluer", feature = "hci")))]
            _ => unreachable!("Backend enum has no variants when no backend features are enabled"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            #[cfg(feature = "bluer")]
            "bluer" | "bluez" => Ok(Backend::Bluer),
            #[cfg(feature = "hci")]
            "hci" | "raw" => Ok(Backend::Hci),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Open a scan source on the selected backend.
///
/// `hci_device` selects the controller (`0` for `hci0`); the BlueZ backend
/// always uses the default adapter.
pub async fn open_scan_source(
    backend: Backend,
    hci_device: u16,
) -> Result<Box<dyn ScanSource>, ScanError> {
    match backend {
        #[cfg(feature = "bluer")]
        Backend::Bluer => {
            let _ = hci_device;
            Ok(Box::new(bluer::open_source().await?))
        }
        #[cfg(feature = "hci")]
        Backend::Hci => Ok(Box::new(hci::open_source(hci_device)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test(start_paused = true)]
    async fn test_collect_batch_gathers_events_within_window() {
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(RawEvent::Hci(vec![1])).await.unwrap();
        tx.send(RawEvent::Hci(vec![2])).await.unwrap();

        let batch = collect_batch(&mut rx, Duration::from_secs(1)).await.unwrap();
        assert_eq!(batch, vec![RawEvent::Hci(vec![1]), RawEvent::Hci(vec![2])]);

        // Sender still alive: an idle window yields an empty batch.
        let batch = collect_batch(&mut rx, Duration::from_secs(1)).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_batch_reports_closed_source() {
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(RawEvent::Hci(vec![1])).await.unwrap();
        drop(tx);

        let batch = collect_batch(&mut rx, Duration::from_secs(1)).await.unwrap();
        assert_eq!(batch.len(), 1);

        let err = collect_batch(&mut rx, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ScanError::SourceClosed));
    }

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::DeviceUnavailable("no adapter".to_string());
        assert_eq!(err.to_string(), "Bluetooth device unavailable: no adapter");
    }

    #[test]
    fn test_backend_from_str() {
        #[cfg(feature = "bluer")]
        assert_eq!(Backend::from_str("bluer").unwrap(), Backend::Bluer);
        #[cfg(feature = "bluer")]
        assert_eq!(Backend::from_str("bluez").unwrap(), Backend::Bluer);
        assert_eq!(Backend::from_str("hci").unwrap(), Backend::Hci);
        assert_eq!(Backend::from_str("RAW").unwrap(), Backend::Hci);
        assert!(Backend::from_str("invalid").is_err());
    }

    #[test]
    fn test_backend_display() {
        #[cfg(feature = "bluer")]
        assert_eq!(format!("{}", Backend::Bluer), "bluer");
        assert_eq!(format!("{}", Backend::Hci), "hci");
    }
}
