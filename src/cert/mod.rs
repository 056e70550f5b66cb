pub mod key;
pub mod parser;
pub mod record;
pub mod serial;

pub use key::{
    derive, derive_by_common_name, derive_by_content_hash, derive_by_serial, CertificateIdentity,
    DerivationMode, DeriveError, KeyInputs, StorageKey,
};
pub use parser::{CertificateInfo, CertificateParser};
pub use record::CertificateRecord;
pub use serial::SerialNumber;
