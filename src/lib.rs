pub mod cert;
pub mod cli;
pub mod utils;
pub mod vault;

pub use cert::{
    derive, derive_by_common_name, derive_by_content_hash, derive_by_serial, CertificateIdentity,
    CertificateRecord, DerivationMode, DeriveError, StorageKey,
};
pub use utils::errors::{Result, VaultPkiError};
