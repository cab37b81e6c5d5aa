use crate::error::Result;
use crate::AuthStore;
use async_trait::async_trait;
use fedgate_models::{EnterpriseAuthConfig, EnterpriseUser, SessionInfo};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory backing store.
///
/// Suitable for tests and single-node deployments. State is lost on
/// restart and not shared across nodes.
#[derive(Default)]
pub struct MemoryStore {
    configs: RwLock<HashMap<Uuid, EnterpriseAuthConfig>>,
    users: RwLock<HashMap<Uuid, EnterpriseUser>>,
    sessions: RwLock<HashMap<String, SessionInfo>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn read_config(&self, organization_id: Uuid) -> Result<Option<EnterpriseAuthConfig>> {
        let configs = self.configs.read().await;
        Ok(configs.get(&organization_id).cloned())
    }

    async fn find_config_by_domain(&self, domain: &str) -> Result<Option<EnterpriseAuthConfig>> {
        let configs = self.configs.read().await;
        Ok(configs.values().find(|c| c.domain == domain).cloned())
    }

    async fn list_configs(&self) -> Result<Vec<EnterpriseAuthConfig>> {
        let configs = self.configs.read().await;
        Ok(configs.values().cloned().collect())
    }

    async fn write_config(&self, config: &EnterpriseAuthConfig) -> Result<()> {
        let mut configs = self.configs.write().await;
        configs.insert(config.organization_id, config.clone());
        Ok(())
    }

    async fn find_user_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<EnterpriseUser>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.organization_id == organization_id && u.email == email)
            .cloned())
    }

    async fn find_user_by_external_id(
        &self,
        organization_id: Uuid,
        external_id: &str,
    ) -> Result<Option<EnterpriseUser>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| {
                u.organization_id == organization_id
                    && u.external_id.as_deref() == Some(external_id)
            })
            .cloned())
    }

    async fn list_users(&self, organization_id: Uuid) -> Result<Vec<EnterpriseUser>> {
        let users = self.users.read().await;
        let mut list: Vec<EnterpriseUser> = users
            .values()
            .filter(|u| u.organization_id == organization_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(list)
    }

    async fn upsert_user(&self, user: &EnterpriseUser) -> Result<()> {
        let mut users = self.users.write().await;
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn upsert_session(&self, session: &SessionInfo) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }

    async fn load_sessions(&self) -> Result<Vec<SessionInfo>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fedgate_models::{SessionMetadata, SsoProvider};
    use std::collections::HashSet;

    fn user(org: Uuid, email: &str, external_id: &str) -> EnterpriseUser {
        EnterpriseUser {
            id: Uuid::new_v4(),
            organization_id: org,
            email: email.to_string(),
            first_name: None,
            last_name: None,
            groups: HashSet::new(),
            roles: HashSet::new(),
            is_active: true,
            sso_provider: Some(SsoProvider::Oidc),
            external_id: Some(external_id.to_string()),
            last_login: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_user_lookup_is_org_scoped() {
        let store = MemoryStore::new();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();

        store
            .upsert_user(&user(org_a, "a@acme.com", "ext-1"))
            .await
            .expect("upsert");

        assert!(store
            .find_user_by_email(org_a, "a@acme.com")
            .await
            .expect("find")
            .is_some());
        assert!(store
            .find_user_by_email(org_b, "a@acme.com")
            .await
            .expect("find")
            .is_none());
        assert!(store
            .find_user_by_external_id(org_a, "ext-1")
            .await
            .expect("find")
            .is_some());
    }

    #[tokio::test]
    async fn test_config_lookup_by_domain() {
        let store = MemoryStore::new();
        let config =
            EnterpriseAuthConfig::new(Uuid::new_v4(), "acme.com", SsoProvider::Oidc);
        store.write_config(&config).await.expect("write");

        let found = store
            .find_config_by_domain("acme.com")
            .await
            .expect("find")
            .expect("config present");
        assert_eq!(found.organization_id, config.organization_id);

        assert!(store
            .find_config_by_domain("other.com")
            .await
            .expect("find")
            .is_none());
    }

    #[tokio::test]
    async fn test_session_mirror_roundtrip() {
        let store = MemoryStore::new();
        let session = SessionInfo {
            session_id: "abc".to_string(),
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            expires_at: Utc::now() + chrono::Duration::hours(8),
            created_at: Utc::now(),
            idle_timeout_minutes: 480,
            metadata: SessionMetadata {
                last_activity: Utc::now(),
                sso_provider: None,
                ip_address: None,
                user_agent: None,
            },
        };

        store.upsert_session(&session).await.expect("upsert");
        assert_eq!(store.load_sessions().await.expect("load").len(), 1);

        store.delete_session("abc").await.expect("delete");
        // Deleting again is idempotent.
        store.delete_session("abc").await.expect("delete");
        assert!(store.load_sessions().await.expect("load").is_empty());
    }
}
