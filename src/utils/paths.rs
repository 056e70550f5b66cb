use crate::utils::errors::{Result, VaultPkiError};
use std::path::PathBuf;

pub struct AppPaths;
const PROGRAM_NAME: &str = "vault-pki-keys";

impl AppPaths {
    /// Get the config directory: ~/.config/vault-pki-keys/
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(PROGRAM_NAME))
            .ok_or_else(|| VaultPkiError::Config("Cannot determine config directory".to_string()))
    }

    /// Get the default config file: ~/.config/vault-pki-keys/config.yaml
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.yaml"))
    }

    /// Get the token file written by `vault login`: ~/.vault-token
    pub fn vault_token_file() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|dir| dir.join(".vault-token"))
            .ok_or_else(|| VaultPkiError::Config("Cannot determine home directory".to_string()))
    }
}
