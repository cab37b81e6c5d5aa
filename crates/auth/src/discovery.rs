use crate::error::{AuthError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The subset of the OIDC discovery document this subsystem depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

/// Fetches provider metadata at protocol initialization and on config
/// update. All calls are bounded by the request timeout; a timed-out fetch
/// degrades federation for the org, it never crashes the process.
#[derive(Clone)]
pub struct DiscoveryClient {
    http: reqwest::Client,
}

impl DiscoveryClient {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { http }
    }

    pub async fn fetch(&self, discovery_url: &str) -> Result<DiscoveryDocument> {
        let response = self
            .http
            .get(discovery_url)
            .send()
            .await
            .map_err(|e| AuthError::ProtocolInitializationFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::ProtocolInitializationFailed(format!(
                "discovery endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<DiscoveryDocument>()
            .await
            .map_err(|e| AuthError::ProtocolInitializationFailed(e.to_string()))
    }
}

impl Default for DiscoveryClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_document_deserializes() {
        let doc: DiscoveryDocument = serde_json::from_str(
            r#"{
                "issuer": "https://idp.acme.com",
                "authorization_endpoint": "https://idp.acme.com/authorize",
                "token_endpoint": "https://idp.acme.com/token",
                "jwks_uri": "https://idp.acme.com/jwks"
            }"#,
        )
        .expect("deserialize");
        assert_eq!(doc.issuer, "https://idp.acme.com");
        assert_eq!(doc.authorization_endpoint, "https://idp.acme.com/authorize");
    }
}
