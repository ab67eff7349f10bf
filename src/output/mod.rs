//! Output formatters for hydrometer readings.
//!
//! The scan loop produces a [`Reading`]; formatters turn it into one line of
//! text for whatever consumes this process's stdout.

pub mod influxdb;
pub mod json;

use crate::reading::Reading;
use std::io::{self, Write};

/// Trait for writing a reading in a particular output format.
pub trait OutputFormatter: Send + Sync {
    /// Write `reading` as a single newline-terminated line.
    fn write(&self, reading: &Reading, out: &mut dyn Write) -> io::Result<()>;
}

/// Available output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON object with label, temperature and specific_gravity
    #[default]
    Json,
    /// InfluxDB line protocol
    Influxdb,
}

impl OutputFormat {
    /// Build the formatter for this format.
    ///
    /// `measurement_name` is only used by the InfluxDB format.
    pub fn formatter(self, measurement_name: &str) -> Box<dyn OutputFormatter> {
        match self {
            OutputFormat::Json => Box::new(json::JsonFormatter),
            OutputFormat::Influxdb => {
                Box::new(influxdb::InfluxDbFormatter::new(measurement_name.to_string()))
            }
        }
    }
}
