use crate::utils::errors::{Result, VaultPkiError};
use crate::utils::paths::AppPaths;
use std::fs;
use std::path::Path;

/// Resolve the Vault token: explicit value (flag or `VAULT_TOKEN`) first,
/// then the token file written by `vault login`.
pub fn resolve_token(explicit: Option<&str>) -> Result<String> {
    if let Some(token) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        tracing::debug!("Using token from command line or environment");
        return Ok(token.to_string());
    }

    let token_file = AppPaths::vault_token_file()?;
    tracing::trace!("Checking token file {}", token_file.display());
    read_token_file(&token_file)
}

fn read_token_file(token_file: &Path) -> Result<String> {
    if !token_file.exists() {
        return Err(VaultPkiError::Auth(
            "No Vault token found. Set VAULT_TOKEN or run 'vault login'.".to_string(),
        ));
    }

    let token = fs::read_to_string(token_file)?;
    let token = token.trim();
    if token.is_empty() {
        return Err(VaultPkiError::Auth(format!(
            "Empty token file {}. Please login again.",
            token_file.display()
        )));
    }

    tracing::debug!("Token loaded from {}", token_file.display());
    Ok(token.to_string())
}

/// Shortened form of a token that is safe to log
pub fn token_hint(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{prefix}***")
}
