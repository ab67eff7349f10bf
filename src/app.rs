//! Core application runner for `tilt-listener`.
//!
//! This module is decoupled from CLI parsing and process exit codes so it can
//! be tested deterministically with an injected scanner and output stream.

use crate::dedup::DedupPolicy;
use crate::output::OutputFormat;
use crate::reading::Reading;
use crate::registry::{Entry, Registry};
use crate::scan_loop::{LoopError, ScanLoop};
use crate::scanner::{Backend, ScanError, ScanSource};
use clap::Parser;
use std::future::Future;
use std::io::{self, Write};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Configuration for a single read.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Hydrometer to look for, as a color name (`black`) or ID=LABEL.
    /// Repeatable. Defaults to all eight Tilt colors.
    #[arg(long = "device", value_parser = crate::registry::parse_entry, value_name = "DEVICE")]
    pub devices: Vec<Entry>,

    /// Length of each collection window.
    /// Accepts duration with suffix: 500ms, 2s, 1m.
    #[arg(long, default_value = "2s", value_parser = crate::duration::parse_duration)]
    pub window: Duration,

    /// Give up if no reading arrives within this duration
    #[arg(long, value_parser = crate::duration::parse_duration)]
    pub timeout: Option<Duration>,

    /// Give up after this many collection windows
    #[arg(long)]
    pub max_batches: Option<usize>,

    /// Which duplicate to keep when a hydrometer broadcasts more than once per window
    #[arg(long, default_value_t, value_enum)]
    pub dedup: DedupPolicy,

    /// Output format
    #[arg(long, default_value_t, value_enum)]
    pub format: OutputFormat,

    /// The name of the measurement in InfluxDB line protocol.
    #[arg(long, default_value = "tilt")]
    pub influxdb_measurement: String,

    /// Bluetooth scanner backend to use
    #[arg(long, default_value_t, value_enum)]
    pub backend: Backend,

    /// HCI controller index for the hci backend (0 for hci0)
    #[arg(long, default_value_t = 0)]
    pub hci_device: u16,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Options {
    /// Registry from `--device` entries, or every Tilt color when none are given.
    pub fn registry(&self) -> Registry {
        if self.devices.is_empty() {
            Registry::default()
        } else {
            Registry::from_entries(&self.devices)
        }
    }

    pub fn scan_loop(&self) -> ScanLoop {
        ScanLoop::new(self.registry())
            .with_window(self.window)
            .with_policy(self.dedup)
            .with_max_batches(self.max_batches)
    }
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Loop(#[from] LoopError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("No reading within {0:?}")]
    TimedOut(Duration),
}

impl RunError {
    /// True when scanning worked but no registered hydrometer was heard.
    pub fn is_no_reading(&self) -> bool {
        matches!(
            self,
            RunError::TimedOut(_)
                | RunError::Loop(LoopError::Cancelled { .. } | LoopError::Exhausted { .. })
        )
    }
}

/// Boxed future returned by [`Scanner::open`].
pub type OpenFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Box<dyn ScanSource>, ScanError>> + Send + 'a>>;

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn open(&self, backend: Backend, hci_device: u16) -> OpenFuture<'_>;
}

/// Real scanner implementation that delegates to the compiled-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn open(&self, backend: Backend, hci_device: u16) -> OpenFuture<'_> {
        Box::pin(crate::scanner::open_scan_source(backend, hci_device))
    }
}

/// Read one hydrometer and write it to `out`.
///
/// Opens the scan source, runs the scan loop until a registered beacon is
/// heard, then formats the reading. `options.timeout` bounds the whole scan;
/// `cancel` stops it early.
pub async fn run_with_io(
    options: Options,
    scanner: &dyn Scanner,
    cancel: &CancellationToken,
    out: &mut dyn Write,
) -> Result<Reading, RunError> {
    let scan_loop = options.scan_loop();
    let formatter = options.format.formatter(&options.influxdb_measurement);
    debug!(
        backend = %options.backend,
        devices = scan_loop.registry().len(),
        window = ?options.window,
        "starting scan"
    );

    let mut source = scanner.open(options.backend, options.hci_device).await?;
    let scan = scan_loop.run(source.as_mut(), cancel);

    let reading = match options.timeout {
        Some(limit) => tokio::time::timeout(limit, scan)
            .await
            .map_err(|_| RunError::TimedOut(limit))??,
        None => scan.await?,
    };

    formatter.write(&reading, out)?;
    Ok(reading)
}
