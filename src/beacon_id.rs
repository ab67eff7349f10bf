//! Beacon identifier type.
//!
//! Every Tilt advertises a 16-byte proximity identifier. The identifier is
//! shared by all Tilts of the same color, so it doubles as the device key.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 16-byte beacon identifier, rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BeaconId(pub [u8; 16]);

impl BeaconId {
    /// Length of the identifier in bytes.
    pub const LEN: usize = 16;

    /// Build an identifier from a slice that is exactly [`BeaconId::LEN`] bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; Self::LEN]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for BeaconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Errors returned when parsing a beacon identifier string.
#[derive(Error, Debug, PartialEq)]
pub enum ParseBeaconIdError {
    #[error("invalid beacon id: expected 32 hex digits, got {0}")]
    InvalidLength(usize),
    #[error("invalid beacon id: '{0}' is not valid hex")]
    InvalidHex(String),
}

impl FromStr for BeaconId {
    type Err = ParseBeaconIdError;

    /// Accepts the compact form (`a495bb30...`) and the dashed UUID form
    /// (`a495bb30-c5b1-4b44-b512-1370f02d74de`), in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.trim().chars().filter(|c| *c != '-').collect();
        if digits.len() != Self::LEN * 2 {
            return Err(ParseBeaconIdError::InvalidLength(digits.len()));
        }

        let mut bytes = [0u8; Self::LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = digits
                .get(i * 2..i * 2 + 2)
                .filter(|pair| pair.bytes().all(|b| b.is_ascii_hexdigit()))
                .ok_or_else(|| ParseBeaconIdError::InvalidHex(digits.clone()))?;
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| ParseBeaconIdError::InvalidHex(pair.to_string()))?;
        }

        Ok(BeaconId(bytes))
    }
}

impl From<[u8; 16]> for BeaconId {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: [u8; 16] = [
        0xa4, 0x95, 0xbb, 0x30, 0xc5, 0xb1, 0x4b, 0x44, 0xb5, 0x12, 0x13, 0x70, 0xf0, 0x2d, 0x74,
        0xde,
    ];

    #[test]
    fn test_display() {
        assert_eq!(
            BeaconId(BLACK).to_string(),
            "a495bb30c5b14b44b5121370f02d74de"
        );
    }

    #[test]
    fn test_from_str_compact_and_dashed() {
        let compact: BeaconId = "a495bb30c5b14b44b5121370f02d74de".parse().unwrap();
        let dashed: BeaconId = "A495BB30-C5B1-4B44-B512-1370F02D74DE".parse().unwrap();
        assert_eq!(compact, BeaconId(BLACK));
        assert_eq!(dashed, compact);
    }

    #[test]
    fn test_from_str_invalid() {
        assert_eq!(
            "a495".parse::<BeaconId>(),
            Err(ParseBeaconIdError::InvalidLength(4))
        );
        assert!(matches!(
            "g495bb30c5b14b44b5121370f02d74de".parse::<BeaconId>(),
            Err(ParseBeaconIdError::InvalidHex(_))
        ));
        // Multi-byte characters must not panic on slicing.
        assert!("é495bb30c5b14b44b5121370f02d74d".parse::<BeaconId>().is_err());
    }

    #[test]
    fn test_from_str_rejects_sign_prefix() {
        assert!(matches!(
            "+495bb30c5b14b44b5121370f02d74de".parse::<BeaconId>(),
            Err(ParseBeaconIdError::InvalidHex(_))
        ));
        assert!(matches!(
            "a495bb30c5b14b44b5121370f02d74+e".parse::<BeaconId>(),
            Err(ParseBeaconIdError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_from_slice() {
        assert_eq!(BeaconId::from_slice(&BLACK), Some(BeaconId(BLACK)));
        assert_eq!(BeaconId::from_slice(&BLACK[..15]), None);
    }
}
