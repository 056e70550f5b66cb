pub mod auth;
pub mod client;
pub mod store;

use reqwest::Client;
use serde_json::Value;

/// Create a standardized HTTP client with security best practices
pub fn create_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .use_rustls_tls()
        .build()
}

/// Extract string array from Vault API response data.keys field
pub fn extract_keys_array(response: &Value) -> Vec<String> {
    response
        .get("data")
        .and_then(|data| data.get("keys"))
        .and_then(|keys| keys.as_array())
        .map(|array| {
            array
                .iter()
                .filter_map(|item| item.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}
