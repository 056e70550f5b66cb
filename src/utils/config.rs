use crate::cert::DerivationMode;
use crate::utils::errors::{Result, VaultPkiError};
use crate::utils::paths::AppPaths;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Settings read from `config.yaml`, then overridden by flags and environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Vault server URL
    pub vault_addr: Option<String>,
    /// Raw storage prefix of the PKI mount, e.g. `logical/<mount-uuid>`
    pub prefix: Option<String>,
    /// Zone mixed into content-hash keys
    pub zone: Option<String>,
    /// Addressing scheme the mount's role uses
    pub store_by: Option<DerivationMode>,
}

impl Config {
    /// Load the given file, or the default one if it exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(VaultPkiError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)
            }
            None => {
                let path = AppPaths::config_file()?;
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    tracing::trace!("No config file at {}", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Apply command-line / environment values on top of the file values
    pub fn with_overrides(self, overrides: Config) -> Self {
        Self {
            vault_addr: overrides.vault_addr.or(self.vault_addr),
            prefix: overrides.prefix.or(self.prefix),
            zone: overrides.zone.or(self.zone),
            store_by: overrides.store_by.or(self.store_by),
        }
    }

    pub fn mode(&self) -> DerivationMode {
        self.store_by.unwrap_or_default()
    }

    pub fn require_vault_addr(&self) -> Result<&str> {
        self.vault_addr.as_deref().ok_or_else(|| {
            VaultPkiError::Config(
                "Vault address not set. Use --vault-addr, VAULT_ADDR or vault_addr in config"
                    .to_string(),
            )
        })
    }

    pub fn require_prefix(&self) -> Result<&str> {
        self.prefix
            .as_deref()
            .filter(|p| !p.trim_matches('/').is_empty())
            .ok_or_else(|| {
                VaultPkiError::Config(
                    "Storage prefix not set. Use --prefix, VAULT_PKI_PREFIX or prefix in config"
                        .to_string(),
                )
            })
    }
}
