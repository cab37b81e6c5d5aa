use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attributes extracted from a validated token or assertion, produced
/// uniformly by every protocol validator. Downstream code never sees the
/// raw token shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedClaims {
    /// The provider's stable subject identifier, when the protocol has one.
    pub subject: Option<String>,

    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,

    #[serde(default)]
    pub groups: Vec<String>,

    pub issuer: Option<String>,
    pub expiry: Option<DateTime<Utc>>,

    /// Whether the provider asserted that multi-factor auth was completed.
    #[serde(default)]
    pub mfa_asserted: bool,
}

impl NormalizedClaims {
    /// The federation key: the subject identifier, or the email when the
    /// protocol has no stable subject.
    pub fn external_id(&self) -> &str {
        self.subject.as_deref().unwrap_or(&self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_id_prefers_subject() {
        let claims = NormalizedClaims {
            subject: Some("idp-123".to_string()),
            email: "a@acme.com".to_string(),
            given_name: None,
            family_name: None,
            groups: vec![],
            issuer: None,
            expiry: None,
            mfa_asserted: false,
        };
        assert_eq!(claims.external_id(), "idp-123");

        let no_subject = NormalizedClaims {
            subject: None,
            ..claims
        };
        assert_eq!(no_subject.external_id(), "a@acme.com");
    }
}
