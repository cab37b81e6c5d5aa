use crate::challenge::ChallengeService;
use crate::config_store::{ConfigStore, ProtocolState};
use crate::error::{AuthError, Result};
use crate::provisioning::UserProvisioningEngine;
use crate::roles::DEFAULT_ROLE;
use crate::session::SessionManager;
use crate::standard::PasswordVerifier;
use crate::validator::ValidatorSet;
use chrono::{DateTime, Duration, Utc};
use fedgate_models::{
    EnterpriseAuthConfig, EnterpriseUser, SessionInfo, SsoProvider,
    DEFAULT_SESSION_TIMEOUT_MINUTES,
};
use rand::RngCore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Anti-forgery state values expire after ten minutes.
const STATE_TTL_MINUTES: i64 = 10;

/// One authentication attempt.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub email: String,
    pub password: Option<String>,
    pub token: Option<String>,
    /// Anti-forgery state returned by the provider redirect, when the
    /// attempt completes an earlier `RedirectRequired`.
    pub state: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuthRequest {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: None,
            token: None,
            state: None,
            ip_address: None,
            user_agent: None,
        }
    }
}

/// Terminal states of an authentication attempt that are not failures.
/// Redirect-required and MFA-required are successful-so-far outcomes the
/// caller routes to follow-up UI.
#[derive(Debug)]
pub enum AuthOutcome {
    Authenticated {
        user: EnterpriseUser,
        session: SessionInfo,
    },
    RedirectRequired {
        authorization_url: String,
        state: String,
    },
    MfaRequired {
        challenge_token: String,
    },
}

impl AuthOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            AuthOutcome::Authenticated { .. } => "AUTHENTICATED",
            AuthOutcome::RedirectRequired { .. } => "SSO_REDIRECT",
            AuthOutcome::MfaRequired { .. } => "MFA_REQUIRED",
        }
    }
}

struct PendingState {
    email: String,
    created_at: DateTime<Utc>,
}

/// Top-level entry point for authentication.
///
/// Resolves the email's domain to an organization config, decides between
/// standard and federated auth, and drives validation, provisioning, the
/// MFA gate and session issuance.
pub struct SsoAuthenticator {
    configs: Arc<ConfigStore>,
    provisioning: Arc<UserProvisioningEngine>,
    sessions: Arc<SessionManager>,
    challenges: ChallengeService,
    validators: ValidatorSet,
    password_verifier: Arc<dyn PasswordVerifier>,
    pending_states: RwLock<HashMap<String, PendingState>>,
}

impl SsoAuthenticator {
    pub fn new(
        configs: Arc<ConfigStore>,
        provisioning: Arc<UserProvisioningEngine>,
        sessions: Arc<SessionManager>,
        challenges: ChallengeService,
        validators: ValidatorSet,
        password_verifier: Arc<dyn PasswordVerifier>,
    ) -> Self {
        Self {
            configs,
            provisioning,
            sessions,
            challenges,
            validators,
            password_verifier,
            pending_states: RwLock::new(HashMap::new()),
        }
    }

    pub async fn authenticate(&self, request: AuthRequest) -> Result<AuthOutcome> {
        let domain = email_domain(&request.email)?;
        let config = self.configs.find_by_domain(domain).await;

        // DomainCheck: enforced SSO forces the federated branch; a
        // presented federation token takes it voluntarily.
        let federated = match &config {
            Some(c) => c.sso_enforced_for(domain) || request.token.is_some(),
            None => false,
        };

        if federated {
            let config = config.ok_or(AuthError::ConfigurationMissing)?;
            self.authenticate_federated(request, config).await
        } else {
            self.authenticate_standard(request, config).await
        }
    }

    async fn authenticate_federated(
        &self,
        request: AuthRequest,
        config: EnterpriseAuthConfig,
    ) -> Result<AuthOutcome> {
        if let ProtocolState::Unavailable { reason } = self
            .configs
            .protocol_state(config.organization_id)
            .await
        {
            return Err(AuthError::ProtocolInitializationFailed(reason));
        }

        let token = match request.token.as_deref() {
            Some(token) => token,
            None => return self.build_redirect(&request.email, &config).await,
        };

        if let Some(state) = request.state.as_deref() {
            self.redeem_state(state, &request.email).await?;
        }

        let discovery_issuer = self
            .configs
            .discovery_for(config.organization_id)
            .await
            .map(|d| d.issuer);
        let validator = self
            .validators
            .validator_for(config.sso_provider, discovery_issuer);
        let claims = validator.validate(token, &config)?;

        let user = self.provisioning.resolve(&claims, &config).await?;
        if !user.is_active {
            tracing::warn!(user_id = %user.id, "login attempt for deactivated user");
            return Err(AuthError::CredentialsInvalid);
        }

        // MFA gate: the provider must have asserted completion, otherwise
        // the caller gets a challenge instead of a session.
        if config.mfa_required && !claims.mfa_asserted {
            let challenge_token =
                self.challenges
                    .issue(user.id, config.organization_id, &user.email)?;
            return Ok(AuthOutcome::MfaRequired { challenge_token });
        }

        let session = self
            .sessions
            .create(
                &user,
                config.session_timeout_minutes,
                Some(config.sso_provider),
                request.ip_address,
                request.user_agent,
            )
            .await?;

        tracing::info!(user_id = %user.id, provider = %config.sso_provider, "federated login");
        Ok(AuthOutcome::Authenticated { user, session })
    }

    async fn authenticate_standard(
        &self,
        request: AuthRequest,
        config: Option<EnterpriseAuthConfig>,
    ) -> Result<AuthOutcome> {
        let password = request
            .password
            .as_deref()
            .ok_or(AuthError::CredentialsInvalid)?;

        let identity = self
            .password_verifier
            .verify_password(&request.email, password)
            .await?
            .ok_or(AuthError::CredentialsInvalid)?;

        // Wrap the delegate's identity into an EnterpriseUser view with
        // the default role. Standard-auth users are not provisioned here.
        let now = Utc::now();
        let mut roles = HashSet::new();
        roles.insert(DEFAULT_ROLE.to_string());
        let user = EnterpriseUser {
            id: identity.user_id.unwrap_or_else(Uuid::new_v4),
            organization_id: config
                .as_ref()
                .map(|c| c.organization_id)
                .unwrap_or_else(Uuid::nil),
            email: identity.email,
            first_name: identity.first_name,
            last_name: identity.last_name,
            groups: HashSet::new(),
            roles,
            is_active: true,
            sso_provider: None,
            external_id: None,
            last_login: Some(now),
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        };

        let timeout = config
            .as_ref()
            .map(|c| c.session_timeout_minutes)
            .unwrap_or(DEFAULT_SESSION_TIMEOUT_MINUTES);
        let session = self
            .sessions
            .create(&user, timeout, None, request.ip_address, request.user_agent)
            .await?;

        tracing::info!(user_id = %user.id, "standard login");
        Ok(AuthOutcome::Authenticated { user, session })
    }

    /// Build the provider redirect for a federated attempt without a
    /// token, with a fresh anti-forgery state bound to the email.
    async fn build_redirect(
        &self,
        email: &str,
        config: &EnterpriseAuthConfig,
    ) -> Result<AuthOutcome> {
        let state = generate_state();
        let authorization_url = match config.sso_provider {
            SsoProvider::Oidc | SsoProvider::OAuth2 => {
                let oidc = config.oidc.as_ref().ok_or_else(|| {
                    AuthError::ProtocolInitializationFailed(
                        "missing OIDC configuration".to_string(),
                    )
                })?;
                let endpoint = match self
                    .configs
                    .discovery_for(config.organization_id)
                    .await
                {
                    Some(doc) => doc.authorization_endpoint,
                    None => oidc.authorization_endpoint.clone().ok_or_else(|| {
                        AuthError::ProtocolInitializationFailed(
                            "no authorization endpoint configured".to_string(),
                        )
                    })?,
                };

                let scopes = if oidc.scopes.is_empty() {
                    "openid email profile".to_string()
                } else {
                    oidc.scopes.join(" ")
                };

                format!(
                    "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
                    endpoint,
                    urlencoding::encode(&oidc.client_id),
                    urlencoding::encode(&oidc.redirect_uri),
                    urlencoding::encode(&scopes),
                    state
                )
            }
            SsoProvider::Saml => {
                let saml = config.saml.as_ref().ok_or_else(|| {
                    AuthError::ProtocolInitializationFailed(
                        "missing SAML configuration".to_string(),
                    )
                })?;
                format!("{}?RelayState={}", saml.sso_url, state)
            }
            // LDAP binds with the presented credential; there is no
            // provider to redirect to.
            SsoProvider::Ldap => return Err(AuthError::CredentialsInvalid),
        };

        self.store_state(&state, email).await;
        Ok(AuthOutcome::RedirectRequired {
            authorization_url,
            state,
        })
    }

    /// Finish a challenged login: verify the MFA challenge token and only
    /// then issue the session.
    pub async fn complete_mfa_challenge(
        &self,
        challenge_token: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<AuthOutcome> {
        let claims = self.challenges.verify(challenge_token)?;
        let organization_id = Uuid::parse_str(&claims.organization_id)
            .map_err(|_| AuthError::InvalidToken("malformed challenge".to_string()))?;

        let config = self.configs.get(organization_id).await?;
        let user = self
            .provisioning
            .find_by_email(organization_id, &claims.email)
            .await?
            .ok_or(AuthError::CredentialsInvalid)?;
        if !user.is_active {
            return Err(AuthError::CredentialsInvalid);
        }

        let session = self
            .sessions
            .create(
                &user,
                config.session_timeout_minutes,
                Some(config.sso_provider),
                ip_address,
                user_agent,
            )
            .await?;

        tracing::info!(user_id = %user.id, "MFA challenge completed");
        Ok(AuthOutcome::Authenticated { user, session })
    }

    async fn store_state(&self, state: &str, email: &str) {
        let mut pending = self.pending_states.write().await;
        // Opportunistically drop stale entries.
        let cutoff = Utc::now() - Duration::minutes(STATE_TTL_MINUTES);
        pending.retain(|_, s| s.created_at > cutoff);
        pending.insert(
            state.to_string(),
            PendingState {
                email: email.to_string(),
                created_at: Utc::now(),
            },
        );
    }

    async fn redeem_state(&self, state: &str, email: &str) -> Result<()> {
        let mut pending = self.pending_states.write().await;
        let entry = pending
            .remove(state)
            .ok_or_else(|| AuthError::InvalidToken("unknown or expired state".to_string()))?;

        let expired =
            Utc::now() - entry.created_at > Duration::minutes(STATE_TTL_MINUTES);
        if expired || entry.email != email {
            return Err(AuthError::InvalidToken(
                "unknown or expired state".to_string(),
            ));
        }
        Ok(())
    }
}

fn email_domain(email: &str) -> Result<&str> {
    match email.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(domain),
        _ => Err(AuthError::CredentialsInvalid),
    }
}

fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
