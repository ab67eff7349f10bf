//! InfluxDB line protocol output formatter.

use crate::output::OutputFormatter;
use crate::reading::Reading;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::time::SystemTime;

/// Field values for InfluxDB line protocol
#[derive(Debug, PartialEq)]
pub enum FieldValue {
    Float(f64),
    /// Unsigned integer, written with the `u` suffix
    UInteger(u64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Float(num) => write!(f, "{num}"),
            FieldValue::UInteger(num) => write!(f, "{num}u"),
        }
    }
}

/// Data point in InfluxDB line protocol
#[derive(Debug)]
pub struct DataPoint {
    pub measurement: String,
    pub tag_set: BTreeMap<String, String>,
    pub field_set: BTreeMap<String, FieldValue>,
    pub timestamp: Option<SystemTime>,
}

fn escape_with(value: &str, special: &[char], fmt: &mut fmt::Formatter) -> fmt::Result {
    for c in value.chars() {
        if special.contains(&c) {
            write!(fmt, "\\")?;
        }
        write!(fmt, "{c}")?;
    }
    Ok(())
}

/// Escape a tag key, tag value or field key.
fn escape(value: &str, fmt: &mut fmt::Formatter) -> fmt::Result {
    escape_with(value, &[',', ' ', '='], fmt)
}

/// Measurement names only escape commas and spaces.
fn escape_measurement(value: &str, fmt: &mut fmt::Formatter) -> fmt::Result {
    escape_with(value, &[',', ' '], fmt)
}

fn fmt_tags(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    for (key, value) in data_point.tag_set.iter() {
        write!(fmt, ",")?;
        escape(key, fmt)?;
        write!(fmt, "=")?;
        escape(value, fmt)?;
    }
    Ok(())
}

fn fmt_fields(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    for (i, (key, value)) in data_point.field_set.iter().enumerate() {
        if i > 0 {
            write!(fmt, ",")?;
        }
        escape(key, fmt)?;
        write!(fmt, "={value}")?;
    }
    Ok(())
}

fn fmt_timestamp(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    // Pre-epoch clocks get no timestamp; the server assigns one instead.
    if let Some(since_epoch) = data_point
        .timestamp
        .and_then(|time| time.duration_since(SystemTime::UNIX_EPOCH).ok())
    {
        write!(fmt, " {}", since_epoch.as_nanos())?;
    }
    Ok(())
}

impl fmt::Display for DataPoint {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        escape_measurement(&self.measurement, fmt)?;
        fmt_tags(self, fmt)?;
        write!(fmt, " ")?;
        fmt_fields(self, fmt)?;
        fmt_timestamp(self, fmt)
    }
}

/// InfluxDB line protocol formatter.
///
/// Tags each point with the beacon id and registry label. Temperature is an
/// unsigned integer field in degrees Fahrenheit; specific gravity is a float.
pub struct InfluxDbFormatter {
    measurement_name: String,
}

impl InfluxDbFormatter {
    pub fn new(measurement_name: String) -> Self {
        Self { measurement_name }
    }

    fn to_data_point(&self, reading: &Reading) -> DataPoint {
        let tag_set = BTreeMap::from([
            ("id".to_string(), reading.id.to_string()),
            ("label".to_string(), reading.label.clone()),
        ]);
        let field_set = BTreeMap::from([
            (
                "temperature".to_string(),
                FieldValue::UInteger(u64::from(reading.temperature)),
            ),
            (
                "specific_gravity".to_string(),
                FieldValue::Float(reading.specific_gravity),
            ),
        ]);

        DataPoint {
            measurement: self.measurement_name.clone(),
            tag_set,
            field_set,
            timestamp: Some(reading.timestamp),
        }
    }
}

impl OutputFormatter for InfluxDbFormatter {
    fn write(&self, reading: &Reading, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", self.to_data_point(reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{BLACK_ID, record};
    use std::time::Duration;

    fn reading_at(label: &str, secs: u64) -> Reading {
        Reading {
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            ..Reading::assemble(label, &record(BLACK_ID, 72, 1035, None))
        }
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Float(1.035).to_string(), "1.035");
        assert_eq!(FieldValue::UInteger(72).to_string(), "72u");
    }

    #[test]
    fn test_data_point_format() {
        let data_point = DataPoint {
            measurement: "test".to_string(),
            tag_set: BTreeMap::from([("name".to_string(), "test".to_string())]),
            field_set: BTreeMap::from([
                ("temperature".to_string(), FieldValue::Float(32.0)),
                ("gravity".to_string(), FieldValue::Float(1.01)),
            ]),
            timestamp: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1000000000)),
        };

        assert_eq!(
            data_point.to_string(),
            "test,name=test gravity=1.01,temperature=32 1000000000000000000"
        );
    }

    #[test]
    fn test_data_point_without_timestamp() {
        let data_point = DataPoint {
            measurement: "test".to_string(),
            tag_set: BTreeMap::new(),
            field_set: BTreeMap::from([("value".to_string(), FieldValue::UInteger(1))]),
            timestamp: None,
        };
        assert_eq!(data_point.to_string(), "test value=1u");
    }

    #[test]
    fn test_influxdb_formatter_line() {
        let formatter = InfluxDbFormatter::new("tilt".to_string());
        let mut out = Vec::new();

        formatter
            .write(&reading_at("BLACK", 1000000000), &mut out)
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "tilt,id=a495bb30c5b14b44b5121370f02d74de,label=BLACK \
             specific_gravity=1.035,temperature=72u 1000000000000000000\n"
        );
    }

    #[test]
    fn test_influxdb_formatter_escapes_tags() {
        let formatter = InfluxDbFormatter::new("tilt".to_string());
        let mut out = Vec::new();

        formatter
            .write(&reading_at("Ale, batch=2", 1), &mut out)
            .unwrap();

        let line = String::from_utf8(out).unwrap();
        assert!(line.contains(",label=Ale\\,\\ batch\\=2 "));
    }

    #[test]
    fn test_measurement_name_keeps_equals_sign() {
        let formatter = InfluxDbFormatter::new("brew=1, cellar".to_string());
        let mut out = Vec::new();

        formatter.write(&reading_at("BLACK", 1), &mut out).unwrap();

        let line = String::from_utf8(out).unwrap();
        assert!(line.starts_with("brew=1\\,\\ cellar,id="));
    }
}
