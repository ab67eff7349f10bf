//! JSON output formatter.

use crate::output::OutputFormatter;
use crate::reading::Reading;
use std::io::{self, Write};

/// Writes each reading as a compact JSON object on its own line.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn write(&self, reading: &Reading, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *out, reading)?;
        writeln!(out)
    }
}
