use crate::error::{AuthError, Result};
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use fedgate_models::{
    EnterpriseAuthConfig, LdapConfig, NormalizedClaims, SamlConfig, SsoProvider,
};
use serde_json::Value;
use std::sync::Arc;

/// Protocol-specific verification of a federated token or assertion into
/// normalized claims.
///
/// Any failed check yields an `InvalidToken` error and no claims — partial
/// claims are never returned.
pub trait TokenValidator: Send + Sync {
    fn validate(
        &self,
        raw_token: &str,
        config: &EnterpriseAuthConfig,
    ) -> Result<NormalizedClaims>;
}

/// Cryptographic verification of a SAML assertion (XML signature, audience
/// restriction). Swappable so deployments can plug in a real XML-dsig
/// implementation.
pub trait AssertionVerifier: Send + Sync {
    fn verify(&self, assertion: &str, config: &SamlConfig) -> Result<NormalizedClaims>;
}

/// Directory bind for LDAP orgs. LDAP has no bearer token; the presented
/// credential is handed to the verifier, which returns the directory
/// attributes as normalized claims.
pub trait BindVerifier: Send + Sync {
    fn bind(&self, credential: &str, config: &LdapConfig) -> Result<NormalizedClaims>;
}

/// Validators that need out-of-band plumbing (SAML crypto, LDAP binds).
/// OIDC/OAuth2 validation is self-contained.
#[derive(Clone, Default)]
pub struct ValidatorSet {
    pub saml_verifier: Option<Arc<dyn AssertionVerifier>>,
    pub ldap_verifier: Option<Arc<dyn BindVerifier>>,
}

impl ValidatorSet {
    /// Select the validator variant for the org's active protocol.
    /// `expected_issuer` comes from the discovery document when one was
    /// fetched at protocol initialization.
    pub fn validator_for(
        &self,
        provider: SsoProvider,
        expected_issuer: Option<String>,
    ) -> Box<dyn TokenValidator> {
        match provider {
            SsoProvider::Oidc | SsoProvider::OAuth2 => {
                Box::new(OidcValidator { expected_issuer })
            }
            SsoProvider::Saml => match &self.saml_verifier {
                Some(verifier) => Box::new(SamlValidator {
                    verifier: verifier.clone(),
                }),
                None => Box::new(UnconfiguredValidator { provider }),
            },
            SsoProvider::Ldap => match &self.ldap_verifier {
                Some(verifier) => Box::new(LdapValidator {
                    verifier: verifier.clone(),
                }),
                None => Box::new(UnconfiguredValidator { provider }),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OIDC / OAuth2 bearer tokens
// ─────────────────────────────────────────────────────────────────────────────

/// Validates OIDC/OAuth2-style bearer tokens: structural well-formedness,
/// expiry (`exp` strictly greater than now) and issuer match.
pub struct OidcValidator {
    /// Issuer from the discovery document; falls back to the configured
    /// issuer when discovery was not run.
    pub expected_issuer: Option<String>,
}

impl TokenValidator for OidcValidator {
    fn validate(
        &self,
        raw_token: &str,
        config: &EnterpriseAuthConfig,
    ) -> Result<NormalizedClaims> {
        let oidc = config.oidc.as_ref().ok_or_else(|| {
            AuthError::ProtocolInitializationFailed("missing OIDC configuration".to_string())
        })?;

        // Structural check: header.payload.signature, JSON in both segments.
        let parts: Vec<&str> = raw_token.split('.').collect();
        if parts.len() != 3 {
            return Err(AuthError::InvalidToken("malformed token".to_string()));
        }
        let _header = decode_segment(parts[0])?;
        let payload = decode_segment(parts[1])?;

        // Expiry: `exp == now` is already expired.
        let exp = payload
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or_else(|| AuthError::InvalidToken("missing exp claim".to_string()))?;
        let now = Utc::now().timestamp();
        if exp <= now {
            return Err(AuthError::InvalidToken("token expired".to_string()));
        }

        // Issuer must match the discovered (or configured) issuer.
        let expected = self.expected_issuer.as_deref().unwrap_or(&oidc.issuer);
        let issuer = payload
            .get("iss")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::InvalidToken("missing iss claim".to_string()))?;
        if issuer != expected {
            return Err(AuthError::InvalidToken("issuer mismatch".to_string()));
        }

        let mappings = &oidc.claim_mappings;
        let email = payload
            .get(&mappings.email)
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::InvalidToken("missing email claim".to_string()))?
            .to_string();

        let groups_claim = oidc.groups_claim.as_deref().unwrap_or("groups");

        Ok(NormalizedClaims {
            subject: payload
                .get("sub")
                .and_then(Value::as_str)
                .map(str::to_string),
            email,
            given_name: mapped_str(&payload, mappings.first_name.as_deref()),
            family_name: mapped_str(&payload, mappings.last_name.as_deref()),
            groups: extract_groups(&payload, groups_claim),
            issuer: Some(issuer.to_string()),
            expiry: expiry_timestamp(exp),
            mfa_asserted: mfa_asserted(&payload),
        })
    }
}

fn decode_segment(segment: &str) -> Result<Value> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::InvalidToken("malformed token".to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::InvalidToken("malformed token".to_string()))
}

fn mapped_str(payload: &Value, claim: Option<&str>) -> Option<String> {
    payload
        .get(claim?)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extract group memberships from the configured claim. Providers emit
/// either an array of strings or a single string.
fn extract_groups(payload: &Value, groups_claim: &str) -> Vec<String> {
    match payload.get(groups_claim) {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Whether the provider asserted multi-factor completion: an `amr` entry
/// of "mfa"/"otp"/"hwk", or an `acr` value naming mfa.
fn mfa_asserted(payload: &Value) -> bool {
    if let Some(Value::Array(amr)) = payload.get("amr") {
        if amr
            .iter()
            .filter_map(Value::as_str)
            .any(|m| matches!(m, "mfa" | "otp" | "hwk"))
        {
            return true;
        }
    }
    payload
        .get("acr")
        .and_then(Value::as_str)
        .map(|acr| acr.contains("mfa"))
        .unwrap_or(false)
}

fn expiry_timestamp(exp: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(exp, 0).single()
}

// ─────────────────────────────────────────────────────────────────────────────
// SAML assertions
// ─────────────────────────────────────────────────────────────────────────────

/// Delegates signature and audience verification to the pluggable
/// `AssertionVerifier`.
pub struct SamlValidator {
    verifier: Arc<dyn AssertionVerifier>,
}

impl TokenValidator for SamlValidator {
    fn validate(
        &self,
        raw_token: &str,
        config: &EnterpriseAuthConfig,
    ) -> Result<NormalizedClaims> {
        let saml = config.saml.as_ref().ok_or_else(|| {
            AuthError::ProtocolInitializationFailed("missing SAML configuration".to_string())
        })?;
        if raw_token.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty assertion".to_string()));
        }
        self.verifier.verify(raw_token, saml)
    }
}

/// Delegates the directory bind to the pluggable `BindVerifier`.
pub struct LdapValidator {
    verifier: Arc<dyn BindVerifier>,
}

impl TokenValidator for LdapValidator {
    fn validate(
        &self,
        raw_token: &str,
        config: &EnterpriseAuthConfig,
    ) -> Result<NormalizedClaims> {
        let ldap = config.ldap.as_ref().ok_or_else(|| {
            AuthError::ProtocolInitializationFailed("missing LDAP configuration".to_string())
        })?;
        self.verifier.bind(raw_token, ldap)
    }
}

/// Stand-in for protocols whose verifier was never plugged in.
struct UnconfiguredValidator {
    provider: SsoProvider,
}

impl TokenValidator for UnconfiguredValidator {
    fn validate(&self, _raw_token: &str, _config: &EnterpriseAuthConfig) -> Result<NormalizedClaims> {
        Err(AuthError::ProtocolInitializationFailed(format!(
            "no {} verifier configured",
            self.provider
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedgate_models::{ClaimMappings, OidcConfig};
    use serde_json::json;
    use uuid::Uuid;

    fn encode_segment(value: &Value) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(value).expect("serialize"))
    }

    fn make_token(payload: Value) -> String {
        format!(
            "{}.{}.signature",
            encode_segment(&json!({"alg": "RS256", "typ": "JWT"})),
            encode_segment(&payload)
        )
    }

    fn oidc_config(issuer: &str) -> EnterpriseAuthConfig {
        let mut config =
            EnterpriseAuthConfig::new(Uuid::new_v4(), "acme.com", SsoProvider::Oidc);
        config.oidc = Some(OidcConfig {
            issuer: issuer.to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            discovery_url: None,
            authorization_endpoint: Some("https://idp.acme.com/authorize".to_string()),
            token_endpoint: Some("https://idp.acme.com/token".to_string()),
            redirect_uri: "https://app.acme.com/callback".to_string(),
            scopes: vec!["openid".to_string(), "email".to_string()],
            groups_claim: None,
            claim_mappings: ClaimMappings::default(),
        });
        config
    }

    fn validator() -> OidcValidator {
        OidcValidator {
            expected_issuer: None,
        }
    }

    fn future_exp() -> i64 {
        Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_valid_token_normalizes_claims() {
        let config = oidc_config("https://idp.acme.com");
        let token = make_token(json!({
            "iss": "https://idp.acme.com",
            "sub": "idp-123",
            "exp": future_exp(),
            "email": "a@acme.com",
            "given_name": "Ada",
            "family_name": "Lovelace",
            "groups": ["eng", "ops"],
            "amr": ["pwd"]
        }));

        let claims = validator().validate(&token, &config).expect("valid");
        assert_eq!(claims.subject.as_deref(), Some("idp-123"));
        assert_eq!(claims.email, "a@acme.com");
        assert_eq!(claims.given_name.as_deref(), Some("Ada"));
        assert_eq!(claims.groups, vec!["eng", "ops"]);
        assert!(!claims.mfa_asserted);
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = oidc_config("https://idp.acme.com");
        let token = make_token(json!({
            "iss": "https://idp.acme.com",
            "exp": Utc::now().timestamp() - 60,
            "email": "a@acme.com"
        }));

        let err = validator().validate(&token, &config).expect_err("expired");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn test_exp_equal_to_now_is_expired() {
        let config = oidc_config("https://idp.acme.com");
        let token = make_token(json!({
            "iss": "https://idp.acme.com",
            "exp": Utc::now().timestamp(),
            "email": "a@acme.com"
        }));

        assert!(validator().validate(&token, &config).is_err());
    }

    #[test]
    fn test_issuer_mismatch_rejected() {
        let config = oidc_config("https://idp.acme.com");
        let token = make_token(json!({
            "iss": "https://evil.example.com",
            "exp": future_exp(),
            "email": "a@acme.com"
        }));

        let err = validator().validate(&token, &config).expect_err("mismatch");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn test_discovered_issuer_takes_precedence() {
        let config = oidc_config("https://static.acme.com");
        let token = make_token(json!({
            "iss": "https://discovered.acme.com",
            "exp": future_exp(),
            "email": "a@acme.com"
        }));

        let validator = OidcValidator {
            expected_issuer: Some("https://discovered.acme.com".to_string()),
        };
        assert!(validator.validate(&token, &config).is_ok());
    }

    #[test]
    fn test_malformed_token_rejected() {
        let config = oidc_config("https://idp.acme.com");
        assert!(validator().validate("not-a-jwt", &config).is_err());
        assert!(validator().validate("a.b", &config).is_err());
        assert!(validator()
            .validate("!!!.@@@.###", &config)
            .is_err());
    }

    #[test]
    fn test_single_string_group_claim() {
        let config = oidc_config("https://idp.acme.com");
        let token = make_token(json!({
            "iss": "https://idp.acme.com",
            "exp": future_exp(),
            "email": "a@acme.com",
            "groups": "eng"
        }));

        let claims = validator().validate(&token, &config).expect("valid");
        assert_eq!(claims.groups, vec!["eng"]);
    }

    #[test]
    fn test_custom_groups_claim() {
        let mut config = oidc_config("https://idp.acme.com");
        config.oidc.as_mut().expect("oidc").groups_claim = Some("roles".to_string());
        let token = make_token(json!({
            "iss": "https://idp.acme.com",
            "exp": future_exp(),
            "email": "a@acme.com",
            "roles": ["admin"],
            "groups": ["ignored"]
        }));

        let claims = validator().validate(&token, &config).expect("valid");
        assert_eq!(claims.groups, vec!["admin"]);
    }

    #[test]
    fn test_amr_asserts_mfa() {
        let config = oidc_config("https://idp.acme.com");
        let token = make_token(json!({
            "iss": "https://idp.acme.com",
            "exp": future_exp(),
            "email": "a@acme.com",
            "amr": ["pwd", "otp"]
        }));

        let claims = validator().validate(&token, &config).expect("valid");
        assert!(claims.mfa_asserted);
    }

    #[test]
    fn test_missing_email_claim_rejected() {
        let config = oidc_config("https://idp.acme.com");
        let token = make_token(json!({
            "iss": "https://idp.acme.com",
            "exp": future_exp()
        }));

        assert!(validator().validate(&token, &config).is_err());
    }

    #[test]
    fn test_unconfigured_saml_is_protocol_failure() {
        let mut config =
            EnterpriseAuthConfig::new(Uuid::new_v4(), "acme.com", SsoProvider::Saml);
        config.saml = Some(fedgate_models::SamlConfig {
            sso_url: "https://idp.acme.com/sso".to_string(),
            entity_id: "acme".to_string(),
            certificate: String::new(),
            sign_requests: false,
        });

        let set = ValidatorSet::default();
        let validator = set.validator_for(SsoProvider::Saml, None);
        let err = validator
            .validate("<assertion/>", &config)
            .expect_err("no verifier");
        assert!(matches!(err, AuthError::ProtocolInitializationFailed(_)));
    }
}
