use crate::discovery::{DiscoveryClient, DiscoveryDocument};
use crate::error::{AuthError, Result};
use fedgate_models::{ConfigUpdate, EnterpriseAuthConfig, SsoProvider};
use fedgate_store::AuthStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Readiness of an organization's active protocol.
#[derive(Debug, Clone)]
pub enum ProtocolState {
    Ready {
        /// Present for OIDC/OAuth2 orgs with a discovery endpoint.
        discovery: Option<DiscoveryDocument>,
    },
    /// Discovery failed or the protocol config is malformed; federation is
    /// disabled for the org until the next config reload.
    Unavailable { reason: String },
}

/// Loads and persists one `EnterpriseAuthConfig` per organization domain.
///
/// Reads go through an in-process cache keyed by org id and by domain;
/// updates persist through the backing store, invalidate the cache, and
/// re-initialize the active protocol when it changed. A failed store read
/// is reported as "no configuration" — federation silently off for that
/// org — rather than failing every request closed.
pub struct ConfigStore {
    store: Arc<dyn AuthStore>,
    discovery: DiscoveryClient,
    by_org: RwLock<HashMap<Uuid, EnterpriseAuthConfig>>,
    by_domain: RwLock<HashMap<String, Uuid>>,
    protocol: RwLock<HashMap<Uuid, ProtocolState>>,
}

impl ConfigStore {
    pub fn new(store: Arc<dyn AuthStore>, discovery: DiscoveryClient) -> Self {
        Self {
            store,
            discovery,
            by_org: RwLock::new(HashMap::new()),
            by_domain: RwLock::new(HashMap::new()),
            protocol: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, organization_id: Uuid) -> Result<EnterpriseAuthConfig> {
        {
            let cache = self.by_org.read().await;
            if let Some(config) = cache.get(&organization_id) {
                return Ok(config.clone());
            }
        }

        let config = match self.store.read_config(organization_id).await {
            Ok(Some(config)) => config,
            Ok(None) => return Err(AuthError::ConfigurationMissing),
            Err(e) => {
                tracing::warn!(%organization_id, error = %e, "config read failed, treating as federation disabled");
                return Err(AuthError::ConfigurationMissing);
            }
        };

        self.cache_config(&config).await;
        Ok(config)
    }

    /// Resolve the config governing an email domain. `None` means the
    /// domain has no federation configuration (or the store is unreachable,
    /// which degrades the same way).
    pub async fn find_by_domain(&self, domain: &str) -> Option<EnterpriseAuthConfig> {
        {
            let domains = self.by_domain.read().await;
            if let Some(org_id) = domains.get(domain) {
                let cache = self.by_org.read().await;
                if let Some(config) = cache.get(org_id) {
                    return Some(config.clone());
                }
            }
        }

        match self.store.find_config_by_domain(domain).await {
            Ok(Some(config)) => {
                self.cache_config(&config).await;
                Some(config)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(domain, error = %e, "config read failed, treating as federation disabled");
                None
            }
        }
    }

    /// Create or replace an organization's configuration, then initialize
    /// its protocol.
    pub async fn upsert(&self, config: EnterpriseAuthConfig) -> Result<EnterpriseAuthConfig> {
        self.store.write_config(&config).await?;
        self.invalidate(config.organization_id).await;
        self.cache_config(&config).await;
        self.initialize_protocol(&config).await;
        Ok(config)
    }

    /// Apply a partial update. Persists to the backing store and
    /// re-initializes the active protocol when `sso_provider` changed.
    pub async fn update(
        &self,
        organization_id: Uuid,
        update: ConfigUpdate,
    ) -> Result<EnterpriseAuthConfig> {
        let mut config = self.get(organization_id).await?;
        let provider_changed = update.apply(&mut config);

        self.store.write_config(&config).await?;
        self.invalidate(organization_id).await;
        self.cache_config(&config).await;

        if provider_changed {
            tracing::info!(%organization_id, provider = %config.sso_provider, "active protocol changed, re-initializing");
        }
        self.initialize_protocol(&config).await;

        Ok(config)
    }

    /// Run protocol initialization: fetch OIDC discovery metadata when
    /// configured. Failure marks the org unavailable and logs, it does not
    /// propagate — the org stays degraded until the next config reload.
    pub async fn initialize_protocol(&self, config: &EnterpriseAuthConfig) {
        let state = match config.sso_provider {
            SsoProvider::Oidc | SsoProvider::OAuth2 => match &config.oidc {
                Some(oidc) => match &oidc.discovery_url {
                    Some(url) => match self.discovery.fetch(url).await {
                        Ok(doc) => ProtocolState::Ready {
                            discovery: Some(doc),
                        },
                        Err(e) => {
                            tracing::error!(
                                organization_id = %config.organization_id,
                                error = %e,
                                "OIDC discovery failed, federation unavailable for org"
                            );
                            ProtocolState::Unavailable {
                                reason: e.to_string(),
                            }
                        }
                    },
                    None => ProtocolState::Ready { discovery: None },
                },
                None => ProtocolState::Unavailable {
                    reason: "missing OIDC configuration".to_string(),
                },
            },
            SsoProvider::Saml => match &config.saml {
                Some(_) => ProtocolState::Ready { discovery: None },
                None => ProtocolState::Unavailable {
                    reason: "missing SAML configuration".to_string(),
                },
            },
            SsoProvider::Ldap => match &config.ldap {
                Some(_) => ProtocolState::Ready { discovery: None },
                None => ProtocolState::Unavailable {
                    reason: "missing LDAP configuration".to_string(),
                },
            },
        };

        let mut protocol = self.protocol.write().await;
        protocol.insert(config.organization_id, state);
    }

    /// Protocol state for an org. Orgs never initialized count as ready so
    /// that statically-configured providers work without a warmup call.
    pub async fn protocol_state(&self, organization_id: Uuid) -> ProtocolState {
        let protocol = self.protocol.read().await;
        protocol
            .get(&organization_id)
            .cloned()
            .unwrap_or(ProtocolState::Ready { discovery: None })
    }

    pub async fn discovery_for(&self, organization_id: Uuid) -> Option<DiscoveryDocument> {
        match self.protocol_state(organization_id).await {
            ProtocolState::Ready { discovery } => discovery,
            ProtocolState::Unavailable { .. } => None,
        }
    }

    async fn cache_config(&self, config: &EnterpriseAuthConfig) {
        let mut cache = self.by_org.write().await;
        let mut domains = self.by_domain.write().await;
        domains.insert(config.domain.clone(), config.organization_id);
        cache.insert(config.organization_id, config.clone());
    }

    async fn invalidate(&self, organization_id: Uuid) {
        let mut cache = self.by_org.write().await;
        if let Some(old) = cache.remove(&organization_id) {
            let mut domains = self.by_domain.write().await;
            domains.remove(&old.domain);
        }
    }
}
