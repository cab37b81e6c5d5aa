use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;
use validator::Validate;

/// Default absolute session lifetime and inactivity window, in minutes.
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 480;

/// Identity protocol an organization federates through.
/// Exactly one protocol is active per organization at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SsoProvider {
    Saml,
    Oidc,
    OAuth2,
    Ldap,
}

impl SsoProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SsoProvider::Saml => "saml",
            SsoProvider::Oidc => "oidc",
            SsoProvider::OAuth2 => "oauth2",
            SsoProvider::Ldap => "ldap",
        }
    }
}

impl std::fmt::Display for SsoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps provider claim names onto the normalized claim fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimMappings {
    pub email: String,          // e.g., "email" or "preferred_username"
    pub first_name: Option<String>, // e.g., "given_name"
    pub last_name: Option<String>,  // e.g., "family_name"
}

impl Default for ClaimMappings {
    fn default() -> Self {
        Self {
            email: "email".to_string(),
            first_name: Some("given_name".to_string()),
            last_name: Some("family_name".to_string()),
        }
    }
}

/// OIDC / OAuth2 provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OidcConfig {
    #[validate(url)]
    pub issuer: String,

    #[validate(length(min = 1))]
    pub client_id: String,

    pub client_secret: String,

    /// Discovery endpoint fetched at protocol initialization and on config
    /// update. When absent, the static endpoints below are used as-is.
    pub discovery_url: Option<String>,

    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,

    #[validate(url)]
    pub redirect_uri: String,

    pub scopes: Vec<String>,

    /// Claim name carrying group memberships (e.g., "groups", "roles").
    pub groups_claim: Option<String>,

    #[serde(default)]
    pub claim_mappings: ClaimMappings,
}

/// SAML identity provider configuration. Assertion signature verification
/// is delegated to a pluggable verifier; this only carries its inputs.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SamlConfig {
    #[validate(url)]
    pub sso_url: String,

    /// Audience restriction the assertion must name.
    #[validate(length(min = 1))]
    pub entity_id: String,

    pub certificate: String,

    #[serde(default)]
    pub sign_requests: bool,
}

/// LDAP directory configuration. The bind itself is delegated to a
/// pluggable verifier.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LdapConfig {
    #[validate(length(min = 1))]
    pub server_url: String,

    pub bind_dn: String,
    pub base_dn: String,
}

/// Directory-sync (SCIM) configuration, independent of the login protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScimConfig {
    pub enabled: bool,

    /// SHA-256 hex digest of the bearer token the identity provider
    /// presents on SCIM calls. The plain token is never stored.
    pub bearer_token_hash: String,
}

/// Per-organization federation settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EnterpriseAuthConfig {
    pub organization_id: Uuid,

    /// Authoritative email domain for the organization.
    #[validate(length(min = 1))]
    pub domain: String,

    pub sso_provider: SsoProvider,

    // Present only for the matching / enabled protocol(s).
    pub saml: Option<SamlConfig>,
    pub oidc: Option<OidcConfig>,
    pub ldap: Option<LdapConfig>,
    pub scim: Option<ScimConfig>,

    /// Auto-create unknown federated users on first login.
    #[serde(default)]
    pub jit_provisioning: bool,

    /// Reject standard (password) login for allowed domains.
    #[serde(default)]
    pub enforce_sso: bool,

    #[serde(default)]
    pub allowed_domains: HashSet<String>,

    #[serde(default = "default_session_timeout")]
    pub session_timeout_minutes: i64,

    #[serde(default)]
    pub mfa_required: bool,

    /// External group name -> internal roles granted by membership.
    #[serde(default)]
    pub role_mapping: HashMap<String, Vec<String>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_session_timeout() -> i64 {
    DEFAULT_SESSION_TIMEOUT_MINUTES
}

impl EnterpriseAuthConfig {
    pub fn new(organization_id: Uuid, domain: impl Into<String>, provider: SsoProvider) -> Self {
        let now = Utc::now();
        let domain = domain.into();
        let mut allowed = HashSet::new();
        allowed.insert(domain.clone());

        Self {
            organization_id,
            domain,
            sso_provider: provider,
            saml: None,
            oidc: None,
            ldap: None,
            scim: None,
            jit_provisioning: false,
            enforce_sso: false,
            allowed_domains: allowed,
            session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
            mfa_required: false,
            role_mapping: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether standard (password) login must be rejected for this domain.
    pub fn sso_enforced_for(&self, domain: &str) -> bool {
        self.enforce_sso && self.allowed_domains.contains(domain)
    }
}

/// Partial update applied through `ConfigStore::update`. Absent fields keep
/// their current values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub sso_provider: Option<SsoProvider>,
    pub saml: Option<SamlConfig>,
    pub oidc: Option<OidcConfig>,
    pub ldap: Option<LdapConfig>,
    pub scim: Option<ScimConfig>,
    pub jit_provisioning: Option<bool>,
    pub enforce_sso: Option<bool>,
    pub allowed_domains: Option<HashSet<String>>,
    pub session_timeout_minutes: Option<i64>,
    pub mfa_required: Option<bool>,
    pub role_mapping: Option<HashMap<String, Vec<String>>>,
}

impl ConfigUpdate {
    /// Apply onto an existing config. Returns true when the active protocol
    /// changed, which forces re-initialization.
    pub fn apply(self, config: &mut EnterpriseAuthConfig) -> bool {
        let mut provider_changed = false;

        if let Some(provider) = self.sso_provider {
            provider_changed = provider != config.sso_provider;
            config.sso_provider = provider;
        }
        if let Some(saml) = self.saml {
            config.saml = Some(saml);
        }
        if let Some(oidc) = self.oidc {
            config.oidc = Some(oidc);
        }
        if let Some(ldap) = self.ldap {
            config.ldap = Some(ldap);
        }
        if let Some(scim) = self.scim {
            config.scim = Some(scim);
        }
        if let Some(jit) = self.jit_provisioning {
            config.jit_provisioning = jit;
        }
        if let Some(enforce) = self.enforce_sso {
            config.enforce_sso = enforce;
        }
        if let Some(domains) = self.allowed_domains {
            config.allowed_domains = domains;
        }
        if let Some(timeout) = self.session_timeout_minutes {
            config.session_timeout_minutes = timeout;
        }
        if let Some(mfa) = self.mfa_required {
            config.mfa_required = mfa;
        }
        if let Some(mapping) = self.role_mapping {
            config.role_mapping = mapping;
        }

        config.updated_at = Utc::now();
        provider_changed
    }
}
