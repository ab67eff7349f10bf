//! Registry of known beacons.
//!
//! Maps beacon identifiers to human-readable labels. The registry decides
//! which decoded records are relevant: anything not registered is ignored.
//! It is built once and passed by value into the scan loop, so tests can
//! supply their own table.

use crate::beacon_id::BeaconId;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifier shared by every Tilt; byte 3 carries the color in its high nibble.
const TILT_ID_TEMPLATE: [u8; 16] = [
    0xa4, 0x95, 0xbb, 0x00, 0xc5, 0xb1, 0x4b, 0x44, 0xb5, 0x12, 0x13, 0x70, 0xf0, 0x2d, 0x74, 0xde,
];
const TILT_COLOR_BYTE: usize = 3;

/// The eight Tilt hydrometer colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TiltColor {
    Red,
    Green,
    Black,
    Purple,
    Orange,
    Blue,
    Yellow,
    Pink,
}

impl TiltColor {
    pub const ALL: [TiltColor; 8] = [
        TiltColor::Red,
        TiltColor::Green,
        TiltColor::Black,
        TiltColor::Purple,
        TiltColor::Orange,
        TiltColor::Blue,
        TiltColor::Yellow,
        TiltColor::Pink,
    ];

    fn code(self) -> u8 {
        match self {
            TiltColor::Red => 1,
            TiltColor::Green => 2,
            TiltColor::Black => 3,
            TiltColor::Purple => 4,
            TiltColor::Orange => 5,
            TiltColor::Blue => 6,
            TiltColor::Yellow => 7,
            TiltColor::Pink => 8,
        }
    }

    /// The beacon identifier advertised by this color.
    pub fn id(self) -> BeaconId {
        let mut bytes = TILT_ID_TEMPLATE;
        bytes[TILT_COLOR_BYTE] = self.code() << 4;
        BeaconId(bytes)
    }

    /// Upper-case color name used as the default label.
    pub fn label(self) -> &'static str {
        match self {
            TiltColor::Red => "RED",
            TiltColor::Green => "GREEN",
            TiltColor::Black => "BLACK",
            TiltColor::Purple => "PURPLE",
            TiltColor::Orange => "ORANGE",
            TiltColor::Blue => "BLUE",
            TiltColor::Yellow => "YELLOW",
            TiltColor::Pink => "PINK",
        }
    }

    /// The color whose identifier is `id`, if it belongs to the Tilt family.
    pub fn from_id(id: &BeaconId) -> Option<TiltColor> {
        TiltColor::ALL.into_iter().find(|color| color.id() == *id)
    }
}

impl fmt::Display for TiltColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TiltColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TiltColor::ALL
            .into_iter()
            .find(|color| color.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown Tilt color: {s}"))
    }
}

impl BeaconId {
    /// The Tilt color this identifier belongs to, if any.
    pub fn tilt_color(&self) -> Option<TiltColor> {
        TiltColor::from_id(self)
    }
}

/// A parsed registry entry mapping a beacon identifier to a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: BeaconId,
    pub label: String,
}

impl From<TiltColor> for Entry {
    fn from(color: TiltColor) -> Self {
        Entry {
            id: color.id(),
            label: color.label().to_string(),
        }
    }
}

/// Parse a registry entry from the command line.
///
/// Accepts either `ID=LABEL` or a bare Tilt color name.
///
/// # Example
/// ```
/// use tilt_listener::registry::parse_entry;
///
/// let entry = parse_entry("a495bb30c5b14b44b5121370f02d74de=Fermenter 1").unwrap();
/// assert_eq!(entry.label, "Fermenter 1");
///
/// let entry = parse_entry("black").unwrap();
/// assert_eq!(entry.label, "BLACK");
/// ```
pub fn parse_entry(src: &str) -> Result<Entry, String> {
    match src.split_once('=') {
        Some((id, label)) => {
            let id = id.parse::<BeaconId>().map_err(|e| e.to_string())?;
            if label.is_empty() {
                return Err("invalid device: label must not be empty".into());
            }
            Ok(Entry {
                id,
                label: label.into(),
            })
        }
        None => src
            .parse::<TiltColor>()
            .map(Entry::from)
            .map_err(|e| format!("{e} (expected a color name or ID=LABEL)")),
    }
}

/// Immutable lookup from beacon identifier to label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    labels: BTreeMap<BeaconId, String>,
}

impl Registry {
    /// Build a registry from `(id, label)` pairs. Later duplicates win.
    pub fn new<I, L>(entries: I) -> Self
    where
        I: IntoIterator<Item = (BeaconId, L)>,
        L: Into<String>,
    {
        Registry {
            labels: entries
                .into_iter()
                .map(|(id, label)| (id, label.into()))
                .collect(),
        }
    }

    /// Build a registry from parsed command-line entries.
    pub fn from_entries(entries: &[Entry]) -> Self {
        Self::new(entries.iter().map(|e| (e.id, e.label.clone())))
    }

    /// All eight Tilt colors, labelled by color name.
    pub fn tilt_colors() -> Self {
        Self::new(TiltColor::ALL.map(|color| (color.id(), color.label())))
    }

    pub fn contains(&self, id: &BeaconId) -> bool {
        self.labels.contains_key(id)
    }

    pub fn label(&self, id: &BeaconId) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BeaconId, &str)> {
        self.labels.iter().map(|(id, label)| (id, label.as_str()))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::tilt_colors()
    }
}
