use crate::cert::{CertificateRecord, StorageKey};
use crate::utils::errors::{Result, VaultPkiError};
use crate::vault::client::VaultClient;

/// Certificate records kept by the PKI plugin under `<prefix>/certs/`
pub struct CertificateStore {
    client: VaultClient,
    prefix: String,
}

impl CertificateStore {
    pub fn new(client: VaultClient, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn record_path(&self, key: &StorageKey) -> String {
        key.record_path(&self.prefix)
    }

    pub async fn read_record(&self, key: &StorageKey) -> Result<Option<CertificateRecord>> {
        let segments = self.record_segments(key)?;
        tracing::debug!("Reading certificate record at {}", self.record_path(key));

        match self.client.read_raw(&segments).await? {
            Some(value) => Ok(Some(CertificateRecord::from_json(&value)?)),
            None => Ok(None),
        }
    }

    pub async fn write_record(&self, key: &StorageKey, record: &CertificateRecord) -> Result<()> {
        let segments = self.record_segments(key)?;
        tracing::info!("Writing certificate record to {}", self.record_path(key));

        self.client.write_raw(&segments, &record.to_json()?).await
    }

    /// Keys of every record under the prefix, in the order Vault returns them
    pub async fn list_keys(&self) -> Result<Vec<String>> {
        let mut segments = self.prefix_segments();
        segments.push("certs");
        let keys = self.client.list_raw(&segments).await?;

        // Sub-folders end with '/', records never do
        Ok(keys.into_iter().filter(|k| !k.ends_with('/')).collect())
    }

    fn prefix_segments(&self) -> Vec<&str> {
        self.prefix.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// `<prefix>/certs/<key>` as path segments; the key must be a single segment
    fn record_segments<'a>(&'a self, key: &'a StorageKey) -> Result<Vec<&'a str>> {
        let key = key.as_str();
        if key.is_empty() || key == "." || key == ".." || key.contains('/') {
            return Err(VaultPkiError::InvalidInput(format!(
                "'{key}' cannot be used as a record key"
            )));
        }

        let mut segments = self.prefix_segments();
        segments.push("certs");
        segments.push(key);
        Ok(segments)
    }
}
