//! `tilt-listener` library.
//!
//! Reads Tilt hydrometers from BLE iBeacon advertisements. Raw scan events
//! flow through [`decoder`], [`dedup`] and [`registry`] inside the
//! [`scan_loop`], which yields one [`Reading`] per run.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, logging setup
//! and process exit codes. The core “business logic” lives in [`crate::app`]
//! where it can be tested deterministically with an injected scanner and
//! output stream.

pub mod app;
pub mod beacon;
pub mod beacon_id;
pub mod decoder;
pub mod dedup;
pub mod duration;
pub mod output;
pub mod reading;
pub mod registry;
pub mod scan_loop;
pub mod scanner;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use beacon::BeaconRecord;
pub use beacon_id::BeaconId;
pub use decoder::{DecodeError, decode, decode_event};
pub use dedup::{DedupPolicy, dedup_first};
pub use duration::parse_duration;
pub use output::influxdb::InfluxDbFormatter;
pub use output::json::JsonFormatter;
pub use output::{OutputFormat, OutputFormatter};
pub use reading::Reading;
pub use registry::{Registry, TiltColor};
pub use scan_loop::{LoopError, ScanLoop, ScanState};
pub use scanner::{Backend, RawEvent, ScanError, ScanSource};
