//! Storage-key derivation for certificate records.
//!
//! The PKI plugin addresses every certificate record as `<prefix>/certs/<key>`,
//! where the key is computed in one of three ways depending on how the role
//! was configured (`store_by`). These functions reproduce that scheme exactly:
//! a key that differs by a single byte addresses a different record.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeriveError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, DeriveError>;

/// Addressing scheme used by the storage layer
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DerivationMode {
    /// Key is the certificate's common name
    #[default]
    #[value(name = "cn")]
    #[serde(rename = "cn")]
    ByCommonName,
    /// Key is the normalized serial number
    #[value(name = "serial")]
    #[serde(rename = "serial")]
    BySerial,
    /// Key is the SHA-1 of the CN, sorted SANs and zone
    #[value(name = "hash")]
    #[serde(rename = "hash")]
    ByContentHash,
}

impl DerivationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivationMode::ByCommonName => "cn",
            DerivationMode::BySerial => "serial",
            DerivationMode::ByContentHash => "hash",
        }
    }
}

impl fmt::Display for DerivationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key under which a certificate record is stored, relative to `<prefix>/certs/`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    /// Wrap a key as returned by a storage listing
    pub fn from_stored(key: &str) -> Self {
        Self(key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Full storage path of the record: `<prefix>/certs/<key>`
    pub fn record_path(&self, prefix: &str) -> String {
        format!("{}/certs/{}", prefix.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity tuple hashed by [`DerivationMode::ByContentHash`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateIdentity {
    pub common_name: String,
    pub alt_names: BTreeSet<String>,
    pub zone: String,
}

impl CertificateIdentity {
    pub fn new<I, S>(common_name: &str, alt_names: I, zone: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            common_name: common_name.to_string(),
            alt_names: alt_names.into_iter().map(Into::into).collect(),
            zone: zone.to_string(),
        }
    }

    pub fn storage_key(&self) -> Result<StorageKey> {
        derive_by_content_hash(&self.common_name, &self.alt_names, &self.zone)
    }
}

/// Mode-specific inputs for [`derive`]; only the fields the mode needs are read
#[derive(Debug, Clone, Default)]
pub struct KeyInputs {
    pub common_name: Option<String>,
    pub serial: Option<String>,
    pub alt_names: BTreeSet<String>,
    pub zone: Option<String>,
}

pub fn derive(mode: DerivationMode, inputs: &KeyInputs) -> Result<StorageKey> {
    match mode {
        DerivationMode::ByCommonName => {
            derive_by_common_name(inputs.common_name.as_deref().unwrap_or_default())
        }
        DerivationMode::BySerial => {
            let serial = inputs.serial.as_deref().ok_or_else(|| {
                DeriveError::InvalidInput("serial number is required for serial mode".to_string())
            })?;
            derive_by_serial(serial)
        }
        DerivationMode::ByContentHash => derive_by_content_hash(
            inputs.common_name.as_deref().unwrap_or_default(),
            &inputs.alt_names,
            inputs.zone.as_deref().unwrap_or_default(),
        ),
    }
}

pub fn derive_by_common_name(common_name: &str) -> Result<StorageKey> {
    if common_name.is_empty() {
        return Err(DeriveError::InvalidInput(
            "common name must not be empty".to_string(),
        ));
    }
    Ok(StorageKey(common_name.to_string()))
}

/// Normalize a hex serial (`AA:01:FF`) to its key form (`aa-01-ff`).
///
/// The rewrite is textual only: digits are lower-cased and separators swapped,
/// byte grouping and leading zeros are preserved as given.
pub fn derive_by_serial(serial_hex: &str) -> Result<StorageKey> {
    if serial_hex.is_empty() {
        return Err(DeriveError::InvalidInput(
            "serial number must not be empty".to_string(),
        ));
    }

    if let Some(ch) = serial_hex
        .chars()
        .find(|ch| !ch.is_ascii_hexdigit() && *ch != ':')
    {
        return Err(DeriveError::InvalidInput(format!(
            "serial number '{serial_hex}' contains invalid character '{ch}'"
        )));
    }

    if !serial_hex.chars().any(|ch| ch.is_ascii_hexdigit()) {
        return Err(DeriveError::InvalidInput(format!(
            "serial number '{serial_hex}' contains no hex digits"
        )));
    }

    let key = serial_hex.to_ascii_lowercase().replace(':', "-");
    Ok(StorageKey(key))
}

/// SHA-1 over `[cn;][sorted,alt,names;]zone`, lower-case hex.
pub fn derive_by_content_hash(
    common_name: &str,
    alt_names: &BTreeSet<String>,
    zone: &str,
) -> Result<StorageKey> {
    if zone.is_empty() {
        return Err(DeriveError::InvalidInput(
            "zone must not be empty".to_string(),
        ));
    }
    if common_name.is_empty() && alt_names.is_empty() {
        return Err(DeriveError::InvalidInput(
            "either a common name or at least one alternative name is required".to_string(),
        ));
    }

    let to_hash = canonical_identity(common_name, alt_names, zone);
    tracing::trace!("Hashing identity string: {to_hash}");

    let digest = Sha1::digest(to_hash.as_bytes());
    Ok(StorageKey(hex::encode(digest)))
}

fn canonical_identity(common_name: &str, alt_names: &BTreeSet<String>, zone: &str) -> String {
    // BTreeSet iterates deduplicated, in byte-wise ascending order
    let sorted_alt_names = alt_names
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",");

    let mut to_hash = String::new();
    if !common_name.is_empty() {
        to_hash.push_str(common_name);
        to_hash.push(';');
    }
    if !sorted_alt_names.is_empty() {
        to_hash.push_str(&sorted_alt_names);
        to_hash.push(';');
    }
    to_hash.push_str(zone);
    to_hash
}
