use serde::{Serialize, Serializer};
use std::fmt;

/// Certificate serial number as read from a certificate, kept as lower-case hex
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerialNumber {
    hex: String,
}

impl SerialNumber {
    /// Build from the big-endian bytes of the serial (no sign padding)
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            hex: hex::encode(bytes),
        }
    }

    /// Get the raw hex format (no colons)
    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    /// Get the colon-separated hex format (e.g., "3b:fc:2e:b1...")
    pub fn as_colon_hex(&self) -> String {
        self.hex
            .as_bytes()
            .chunks(2)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_colon_hex())
    }
}

impl Serialize for SerialNumber {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.as_colon_hex())
    }
}
