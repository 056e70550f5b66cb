use crate::utils::errors::{Result, VaultPkiError};
use reqwest::{Client, Method, Response, Url};
use serde_json::{json, Value};

/// Thin client over Vault's raw storage API (`sys/raw`)
///
/// Paths are passed as segments; each one is percent-encoded on its own so a
/// `#`, `?` or `/` inside a segment never changes which entry is addressed.
pub struct VaultClient {
    client: Client,
    vault_addr: String,
    token: String,
}

impl VaultClient {
    pub fn new(vault_addr: &str, token: &str) -> Result<Self> {
        let client = super::create_http_client()?;

        Ok(Self {
            client,
            vault_addr: vault_addr.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Get vault address
    pub fn vault_addr(&self) -> &str {
        &self.vault_addr
    }

    fn url(&self, segments: &[&str], trailing_slash: bool) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/v1/", self.vault_addr)).map_err(|e| {
            VaultPkiError::Config(format!("Invalid Vault address '{}': {e}", self.vault_addr))
        })?;

        {
            let mut path = url.path_segments_mut().map_err(|_| {
                VaultPkiError::Config(format!("Invalid Vault address '{}'", self.vault_addr))
            })?;
            path.pop_if_empty().extend(segments);
            if trailing_slash {
                path.push("");
            }
        }
        Ok(url)
    }

    /// Generic GET request to Vault API; `None` on 404
    pub async fn get(&self, segments: &[&str]) -> Result<Option<Value>> {
        let url = self.url(segments, false)?;
        tracing::debug!("Making GET request to: {}", url);

        let response = self
            .client
            .get(url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Generic LIST request to Vault API; `None` on 404
    pub async fn list(&self, segments: &[&str]) -> Result<Option<Value>> {
        let url = self.url(segments, true)?;
        tracing::debug!("Making LIST request to: {}", url);

        let method = Method::from_bytes(b"LIST")
            .map_err(|e| VaultPkiError::Storage(format!("Invalid HTTP method: {e}")))?;
        let response = self
            .client
            .request(method, url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Generic PUT request to Vault API
    pub async fn put(&self, segments: &[&str], data: Value) -> Result<Value> {
        let url = self.url(segments, false)?;
        tracing::debug!("Making PUT request to: {}", url);

        let response = self
            .client
            .put(url.clone())
            .header("X-Vault-Token", &self.token)
            .json(&data)
            .send()
            .await?;

        self.handle_response(response)
            .await?
            .ok_or_else(|| VaultPkiError::Storage(format!("Vault API error (404): {url}")))
    }

    /// Read a raw storage entry; `None` when the entry does not exist
    pub async fn read_raw(&self, path: &[&str]) -> Result<Option<String>> {
        let Some(response) = self.get(&raw_segments(path)).await? else {
            return Ok(None);
        };

        let value = response
            .get("data")
            .and_then(|data| data.get("value"))
            .or_else(|| response.get("value"))
            .and_then(|value| value.as_str())
            .ok_or_else(|| {
                VaultPkiError::Storage(format!(
                    "Raw entry '{}' has no string value",
                    path.join("/")
                ))
            })?;

        Ok(Some(value.to_string()))
    }

    /// Overwrite a raw storage entry
    pub async fn write_raw(&self, path: &[&str], value: &str) -> Result<()> {
        self.put(&raw_segments(path), json!({ "value": value }))
            .await?;
        Ok(())
    }

    /// List keys directly under a raw storage prefix; empty when nothing is there
    pub async fn list_raw(&self, prefix: &[&str]) -> Result<Vec<String>> {
        Ok(self
            .list(&raw_segments(prefix))
            .await?
            .map(|response| super::extract_keys_array(&response))
            .unwrap_or_default())
    }

    /// Handle HTTP response from Vault
    async fn handle_response(&self, response: Response) -> Result<Option<Value>> {
        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if status.is_success() {
            // Writes answer 204 with an empty body
            let body = response.text().await?;
            if body.trim().is_empty() {
                Ok(Some(Value::Null))
            } else {
                Ok(Some(serde_json::from_str(&body)?))
            }
        } else if status == 404 {
            Ok(None)
        } else if status == 403 {
            Err(VaultPkiError::Auth(
                "Access denied - token may be invalid, expired, or lack sys/raw permissions"
                    .to_string(),
            ))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(VaultPkiError::Storage(format!(
                "Vault API error ({status}): {error_text}"
            )))
        }
    }
}

fn raw_segments<'a>(path: &[&'a str]) -> Vec<&'a str> {
    let mut segments = vec!["sys", "raw"];
    segments.extend_from_slice(path);
    segments
}
