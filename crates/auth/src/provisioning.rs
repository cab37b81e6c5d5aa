use crate::error::{AuthError, Result};
use crate::roles::map_roles;
use chrono::Utc;
use fedgate_models::{
    CreateScimUser, EnterpriseAuthConfig, EnterpriseUser, NormalizedClaims,
};
use fedgate_store::AuthStore;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Creates and updates `EnterpriseUser` records from federated claims (JIT)
/// and from SCIM pushes. This engine exclusively owns writes to users.
///
/// Persistence failures propagate to the caller as fatal for that request;
/// there are no retries at this layer.
pub struct UserProvisioningEngine {
    store: Arc<dyn AuthStore>,
}

impl UserProvisioningEngine {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Resolve a validated claim set to a user record. Called only after
    /// token validation succeeded.
    ///
    /// Existing users are refreshed from the claims: fields present and
    /// non-empty in the claims win; absent or empty claim fields never
    /// clear previously stored values. Roles are always recomputed from
    /// the resulting groups.
    pub async fn resolve(
        &self,
        claims: &NormalizedClaims,
        config: &EnterpriseAuthConfig,
    ) -> Result<EnterpriseUser> {
        let existing = self
            .store
            .find_user_by_email(config.organization_id, &claims.email)
            .await?;

        if let Some(mut user) = existing {
            self.apply_claims(&mut user, claims, config);
            self.store.upsert_user(&user).await?;
            tracing::debug!(user_id = %user.id, email = %user.email, "refreshed user from claims");
            return Ok(user);
        }

        if !config.jit_provisioning {
            tracing::info!(
                organization_id = %config.organization_id,
                email = %claims.email,
                "rejecting unknown federated user, JIT provisioning disabled"
            );
            return Err(AuthError::UserNotProvisioned);
        }

        let now = Utc::now();
        let groups: HashSet<String> = claims.groups.iter().cloned().collect();
        let user = EnterpriseUser {
            id: Uuid::new_v4(),
            organization_id: config.organization_id,
            email: claims.email.clone(),
            first_name: claims.given_name.clone(),
            last_name: claims.family_name.clone(),
            roles: map_roles(&groups, &config.role_mapping),
            groups,
            is_active: true,
            sso_provider: Some(config.sso_provider),
            external_id: Some(claims.external_id().to_string()),
            last_login: Some(now),
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        };

        self.store.upsert_user(&user).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "JIT-provisioned user");
        Ok(user)
    }

    fn apply_claims(
        &self,
        user: &mut EnterpriseUser,
        claims: &NormalizedClaims,
        config: &EnterpriseAuthConfig,
    ) {
        if let Some(given) = non_empty(&claims.given_name) {
            user.first_name = Some(given);
        }
        if let Some(family) = non_empty(&claims.family_name) {
            user.last_name = Some(family);
        }
        if !claims.groups.is_empty() {
            user.groups = claims.groups.iter().cloned().collect();
        }
        user.roles = map_roles(&user.groups, &config.role_mapping);
        user.sso_provider = Some(config.sso_provider);
        if user.external_id.is_none() {
            user.external_id = Some(claims.external_id().to_string());
        }
        user.last_login = Some(Utc::now());
        user.updated_at = Utc::now();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Directory-sync (SCIM) operations
    // ─────────────────────────────────────────────────────────────────────

    /// Provision a user pushed by the identity provider. SCIM creation is
    /// always allowed when SCIM is enabled — the IdP is the authority — so
    /// this bypasses the JIT gate.
    pub async fn scim_create(
        &self,
        config: &EnterpriseAuthConfig,
        request: &CreateScimUser,
    ) -> Result<EnterpriseUser> {
        let email = request.email();

        if self
            .store
            .find_user_by_email(config.organization_id, &email)
            .await?
            .is_some()
        {
            return Err(AuthError::AlreadyExists(format!(
                "user {} already exists in this organization",
                email
            )));
        }

        let now = Utc::now();
        let groups: HashSet<String> = request.groups.iter().map(|g| g.value.clone()).collect();
        let user = EnterpriseUser {
            id: Uuid::new_v4(),
            organization_id: config.organization_id,
            email: email.clone(),
            first_name: request.name.as_ref().and_then(|n| n.given_name.clone()),
            last_name: request.name.as_ref().and_then(|n| n.family_name.clone()),
            roles: map_roles(&groups, &config.role_mapping),
            groups,
            is_active: request.active,
            sso_provider: Some(config.sso_provider),
            external_id: request
                .external_id
                .clone()
                .or_else(|| Some(email.clone())),
            last_login: None,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        };

        self.store.upsert_user(&user).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "provisioned user via SCIM");
        Ok(user)
    }

    pub async fn find_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<EnterpriseUser>> {
        Ok(self
            .store
            .find_user_by_email(organization_id, email)
            .await?)
    }

    pub async fn find_by_external_id(
        &self,
        organization_id: Uuid,
        external_id: &str,
    ) -> Result<Option<EnterpriseUser>> {
        Ok(self
            .store
            .find_user_by_external_id(organization_id, external_id)
            .await?)
    }

    /// Active users of an organization, for the SCIM listing surface.
    pub async fn list_active(&self, organization_id: Uuid) -> Result<Vec<EnterpriseUser>> {
        let users = self.store.list_users(organization_id).await?;
        Ok(users.into_iter().filter(|u| u.is_active).collect())
    }

    /// Explicit deactivation. Users are never hard-deleted; this is the
    /// only path out of the active state.
    pub async fn deactivate(
        &self,
        organization_id: Uuid,
        external_id: &str,
    ) -> Result<EnterpriseUser> {
        let mut user = self
            .store
            .find_user_by_external_id(organization_id, external_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {}", external_id)))?;

        user.is_active = false;
        user.updated_at = Utc::now();
        self.store.upsert_user(&user).await?;
        tracing::info!(user_id = %user.id, "deactivated user");
        Ok(user)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedgate_models::{ScimName, ScimUser, SsoProvider};
    use fedgate_store::MemoryStore;

    fn engine() -> (UserProvisioningEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (UserProvisioningEngine::new(store.clone()), store)
    }

    fn acme_config(jit: bool) -> EnterpriseAuthConfig {
        let mut config =
            EnterpriseAuthConfig::new(Uuid::new_v4(), "acme.com", SsoProvider::Oidc);
        config.jit_provisioning = jit;
        config
            .role_mapping
            .insert("eng".to_string(), vec!["developer".to_string()]);
        config
    }

    fn claims(email: &str, groups: &[&str]) -> NormalizedClaims {
        NormalizedClaims {
            subject: Some("idp-123".to_string()),
            email: email.to_string(),
            given_name: Some("Ada".to_string()),
            family_name: Some("Lovelace".to_string()),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            issuer: Some("https://idp.acme.com".to_string()),
            expiry: None,
            mfa_asserted: false,
        }
    }

    #[tokio::test]
    async fn test_jit_creates_user_with_mapped_roles() {
        let (engine, _) = engine();
        let config = acme_config(true);

        let user = engine
            .resolve(&claims("a@acme.com", &["eng"]), &config)
            .await
            .expect("resolve");

        assert_eq!(user.email, "a@acme.com");
        assert_eq!(user.external_id.as_deref(), Some("idp-123"));
        assert!(user.roles.contains("developer"));
        assert_eq!(user.roles.len(), 1);
        assert!(user.is_active);
        assert!(user.last_login.is_some());
    }

    #[tokio::test]
    async fn test_jit_disabled_rejects_unknown_user() {
        let (engine, store) = engine();
        let config = acme_config(false);

        let err = engine
            .resolve(&claims("a@acme.com", &["eng"]), &config)
            .await
            .expect_err("rejected");
        assert!(matches!(err, AuthError::UserNotProvisioned));

        // No record was written.
        assert!(store
            .find_user_by_email(config.organization_id, "a@acme.com")
            .await
            .expect("find")
            .is_none());
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let (engine, store) = engine();
        let config = acme_config(true);
        let claims = claims("a@acme.com", &["eng"]);

        let first = engine.resolve(&claims, &config).await.expect("first");
        let second = engine.resolve(&claims, &config).await.expect("second");

        assert_eq!(first.id, second.id);
        assert_eq!(first.roles, second.roles);
        assert_eq!(
            store
                .list_users(config.organization_id)
                .await
                .expect("list")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_claims_win_but_empty_fields_are_ignored() {
        let (engine, _) = engine();
        let config = acme_config(true);

        engine
            .resolve(&claims("a@acme.com", &["eng"]), &config)
            .await
            .expect("create");

        // Fresh login with a changed name but no groups and an empty
        // family name: the name updates, groups and last name survive.
        let update = NormalizedClaims {
            given_name: Some("Grace".to_string()),
            family_name: Some(String::new()),
            groups: vec![],
            ..claims("a@acme.com", &[])
        };
        let user = engine.resolve(&update, &config).await.expect("update");

        assert_eq!(user.first_name.as_deref(), Some("Grace"));
        assert_eq!(user.last_name.as_deref(), Some("Lovelace"));
        assert!(user.groups.contains("eng"));
        assert!(user.roles.contains("developer"));
    }

    #[tokio::test]
    async fn test_pre_provisioned_user_gets_external_id_on_first_login() {
        let (engine, store) = engine();
        let config = acme_config(false);

        // Pre-provisioned record without federation identifiers.
        let now = Utc::now();
        store
            .upsert_user(&EnterpriseUser {
                id: Uuid::new_v4(),
                organization_id: config.organization_id,
                email: "a@acme.com".to_string(),
                first_name: None,
                last_name: None,
                groups: HashSet::new(),
                roles: HashSet::new(),
                is_active: true,
                sso_provider: None,
                external_id: None,
                last_login: None,
                metadata: serde_json::Value::Null,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed");

        let user = engine
            .resolve(&claims("a@acme.com", &["eng"]), &config)
            .await
            .expect("resolve");
        assert_eq!(user.external_id.as_deref(), Some("idp-123"));
        assert_eq!(user.sso_provider, Some(SsoProvider::Oidc));
        assert!(user.roles.contains("developer"));
    }

    #[tokio::test]
    async fn test_scim_create_bypasses_jit_and_round_trips() {
        let (engine, _) = engine();
        let config = acme_config(false); // JIT off: SCIM must still create.

        let request = CreateScimUser {
            schemas: ScimUser::schemas(),
            external_id: Some("ext-9".to_string()),
            user_name: "b@acme.com".to_string(),
            name: Some(ScimName {
                formatted: None,
                given_name: Some("Grace".to_string()),
                family_name: Some("Hopper".to_string()),
            }),
            emails: vec![],
            active: true,
            groups: vec![],
        };

        let created = engine.scim_create(&config, &request).await.expect("create");
        assert_eq!(created.email, "b@acme.com");

        let fetched = engine
            .find_by_external_id(config.organization_id, "ext-9")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.first_name.as_deref(), Some("Grace"));
        assert!(fetched.is_active);
    }

    #[tokio::test]
    async fn test_scim_create_conflicts_on_duplicate_email() {
        let (engine, _) = engine();
        let config = acme_config(true);

        engine
            .resolve(&claims("a@acme.com", &[]), &config)
            .await
            .expect("seed");

        let request = CreateScimUser {
            schemas: ScimUser::schemas(),
            external_id: None,
            user_name: "a@acme.com".to_string(),
            name: None,
            emails: vec![],
            active: true,
            groups: vec![],
        };
        let err = engine
            .scim_create(&config, &request)
            .await
            .expect_err("conflict");
        assert!(matches!(err, AuthError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_deactivate_is_explicit_and_preserves_record() {
        let (engine, _) = engine();
        let config = acme_config(true);

        engine
            .resolve(&claims("a@acme.com", &[]), &config)
            .await
            .expect("seed");

        let user = engine
            .deactivate(config.organization_id, "idp-123")
            .await
            .expect("deactivate");
        assert!(!user.is_active);

        // Still retrievable, just inactive.
        assert!(engine
            .find_by_external_id(config.organization_id, "idp-123")
            .await
            .expect("find")
            .is_some());
        assert!(engine
            .list_active(config.organization_id)
            .await
            .expect("list")
            .is_empty());
    }
}
