use crate::cert::DerivationMode;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vault-pki-keys")]
#[command(version)]
#[command(about = "Locate and manage PKI plugin certificate records in Vault raw storage")]
#[command(long_about = None)]
pub struct Cli {
    /// Vault server URL
    #[arg(long, env = "VAULT_ADDR", global = true)]
    pub vault_addr: Option<String>,

    /// Vault token (falls back to ~/.vault-token)
    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Config file path (default: ~/.config/vault-pki-keys/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more verbosity: -v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output raw tab-separated values (no formatting)
    #[arg(short, long, global = true)]
    pub raw: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Derive the storage key of a certificate (no Vault access)
    Key {
        #[command(flatten)]
        select: KeySelector,
    },
    /// Show the certificate record stored for a key
    Show {
        #[command(flatten)]
        select: KeySelector,
        /// Print the stored certificate and chain as PEM
        #[arg(long)]
        pem: bool,
    },
    /// Write a certificate, key and chain into the record for its key
    Update {
        /// Storage key mode used by the PKI role
        #[arg(long, value_enum, env = "VAULT_PKI_STORE_BY")]
        store_by: Option<DerivationMode>,
        /// Zone for content-hash keys
        #[arg(long, env = "VAULT_PKI_ZONE")]
        zone: Option<String>,
        /// Raw storage prefix of the PKI mount (e.g. logical/<mount-uuid>)
        #[arg(long, env = "VAULT_PKI_PREFIX")]
        prefix: Option<String>,
        /// PEM certificate file
        #[arg(long, short = 'c', value_hint = clap::ValueHint::FilePath)]
        cert_file: PathBuf,
        /// PEM private key file
        #[arg(long, short = 'k', value_hint = clap::ValueHint::FilePath)]
        key_file: PathBuf,
        /// PEM intermediate chain file
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        chain_file: Option<PathBuf>,
        /// Print what would be written without touching Vault
        #[arg(long)]
        dry_run: bool,
    },
    /// List stored certificate records with their expiry
    List {
        /// Raw storage prefix of the PKI mount (e.g. logical/<mount-uuid>)
        #[arg(long, env = "VAULT_PKI_PREFIX")]
        prefix: Option<String>,
        /// Only show records expiring within this many days
        #[arg(long)]
        expires_within: Option<u32>,
    },
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Identifies a certificate record, explicitly or from a certificate file
#[derive(Args, Debug, Clone, Default)]
pub struct KeySelector {
    /// Storage key mode used by the PKI role
    #[arg(long, value_enum, env = "VAULT_PKI_STORE_BY")]
    pub store_by: Option<DerivationMode>,
    /// Common name
    #[arg(long)]
    pub cn: Option<String>,
    /// Serial number in hex, optionally colon-separated (e.g. 00:11:22)
    #[arg(long, short = 'i')]
    pub serial: Option<String>,
    /// Subject alternative name (repeatable or comma-separated)
    #[arg(long = "alt-name", value_delimiter = ',')]
    pub alt_names: Vec<String>,
    /// Zone for content-hash keys
    #[arg(long, env = "VAULT_PKI_ZONE")]
    pub zone: Option<String>,
    /// Read CN, serial and SANs from this PEM certificate
    #[arg(long, short = 'f', value_hint = clap::ValueHint::FilePath)]
    pub cert_file: Option<PathBuf>,
    /// Raw storage prefix of the PKI mount (e.g. logical/<mount-uuid>)
    #[arg(long, env = "VAULT_PKI_PREFIX")]
    pub prefix: Option<String>,
}
