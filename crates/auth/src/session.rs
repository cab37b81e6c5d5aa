use crate::error::Result;
use chrono::{Duration, Utc};
use fedgate_models::{EnterpriseUser, SessionInfo, SessionMetadata, SsoProvider};
use fedgate_store::AuthStore;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How often the background sweep scans the index.
pub const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(300);

/// Issues, validates and invalidates sessions.
///
/// The in-memory index is authoritative for active-session checks; the
/// backing store is a durable mirror consulted only to rehydrate after a
/// restart. Expired sessions are evicted lazily when `validate` encounters
/// them and in bulk by the periodic sweep.
pub struct SessionManager {
    store: Arc<dyn AuthStore>,
    index: RwLock<HashMap<String, SessionInfo>>,
    shutdown: CancellationToken,
}

impl SessionManager {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self {
            store,
            index: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Reload the index from the durable mirror, dropping entries that
    /// expired while the process was down.
    pub async fn rehydrate(&self) -> Result<usize> {
        let sessions = self.store.load_sessions().await?;
        let mut index = self.index.write().await;
        let mut restored = 0;
        for session in sessions {
            if session.is_valid() {
                index.insert(session.session_id.clone(), session);
                restored += 1;
            }
        }
        tracing::info!(restored, "rehydrated session index");
        Ok(restored)
    }

    /// Issue a session for an authenticated user. The identifier is
    /// generated here, so creation happens-before any validate/invalidate
    /// for that id.
    pub async fn create(
        &self,
        user: &EnterpriseUser,
        timeout_minutes: i64,
        sso_provider: Option<SsoProvider>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<SessionInfo> {
        let now = Utc::now();
        let session = SessionInfo {
            session_id: generate_session_id(),
            user_id: user.id,
            organization_id: user.organization_id,
            expires_at: now + Duration::minutes(timeout_minutes),
            created_at: now,
            idle_timeout_minutes: timeout_minutes,
            metadata: SessionMetadata {
                last_activity: now,
                sso_provider,
                ip_address,
                user_agent,
            },
        };

        self.store.upsert_session(&session).await?;
        let mut index = self.index.write().await;
        index.insert(session.session_id.clone(), session.clone());
        tracing::debug!(user_id = %user.id, "created session");
        Ok(session)
    }

    /// Look up a session. Returns `None` — not an error — for unknown or
    /// expired ids. A valid hit refreshes the sliding activity window; an
    /// expired hit is evicted on the spot.
    pub async fn validate(&self, session_id: &str) -> Option<SessionInfo> {
        enum Hit {
            Valid(SessionInfo),
            Evicted,
            Miss,
        }

        // The write lock is released before any store I/O.
        let hit = {
            let mut index = self.index.write().await;
            match index.get_mut(session_id) {
                Some(session) if session.is_valid() => {
                    session.touch();
                    Hit::Valid(session.clone())
                }
                Some(_) => {
                    index.remove(session_id);
                    Hit::Evicted
                }
                None => Hit::Miss,
            }
        };

        match hit {
            Hit::Valid(session) => {
                // Mirror the refreshed activity stamp; the index stays
                // authoritative if the store is unreachable.
                if let Err(e) = self.store.upsert_session(&session).await {
                    tracing::warn!(error = %e, "failed to mirror session activity");
                }
                Some(session)
            }
            Hit::Evicted => {
                tracing::debug!(session_id, "lazily evicted expired session");
                if let Err(e) = self.store.delete_session(session_id).await {
                    tracing::warn!(error = %e, "failed to delete expired session from store");
                }
                None
            }
            Hit::Miss => None,
        }
    }

    /// Remove a session. Idempotent: removing an unknown id is a no-op.
    pub async fn invalidate(&self, session_id: &str) -> Result<()> {
        {
            let mut index = self.index.write().await;
            index.remove(session_id);
        }
        self.store.delete_session(session_id).await?;
        Ok(())
    }

    /// Remove every session belonging to a user (logout-everywhere /
    /// admin revoke). Idempotent.
    pub async fn invalidate_all(&self, user_id: Uuid) -> Result<usize> {
        let ids: Vec<String> = {
            let mut index = self.index.write().await;
            let ids: Vec<String> = index
                .iter()
                .filter(|(_, s)| s.user_id == user_id)
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ids {
                index.remove(id);
            }
            ids
        };

        for id in &ids {
            if let Err(e) = self.store.delete_session(id).await {
                tracing::warn!(error = %e, "failed to delete revoked session from store");
            }
        }
        tracing::info!(%user_id, revoked = ids.len(), "revoked user sessions");
        Ok(ids.len())
    }

    /// One sweep pass: snapshot expired ids under the read lock, then evict
    /// and issue store deletes. The write lock is never held across store
    /// I/O or the full scan, so concurrent logins are not starved. A failed
    /// store delete is logged and retried on the next cycle.
    pub async fn sweep(&self) -> usize {
        let expired: Vec<String> = {
            let index = self.index.read().await;
            index
                .iter()
                .filter(|(_, s)| !s.is_valid())
                .map(|(id, _)| id.clone())
                .collect()
        };

        if expired.is_empty() {
            return 0;
        }

        let mut evicted = 0;
        for id in &expired {
            let removed = {
                let mut index = self.index.write().await;
                // Re-check: the session may have been touched since the
                // snapshot.
                match index.get(id) {
                    Some(s) if !s.is_valid() => {
                        index.remove(id);
                        true
                    }
                    _ => false,
                }
            };

            if removed {
                evicted += 1;
                if let Err(e) = self.store.delete_session(id).await {
                    tracing::warn!(session_id = %id, error = %e, "sweep failed to delete session from store");
                }
            }
        }

        if evicted > 0 {
            tracing::info!(evicted, "sweep evicted expired sessions");
        }
        evicted
    }

    /// Spawn the periodic sweep for the lifetime of the process. Cancelled
    /// by `shutdown`.
    pub fn start_sweep(self: Arc<Self>, period: std::time::Duration) {
        let token = self.shutdown.clone();
        let manager = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; skip it.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("session sweep stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        manager.sweep().await;
                    }
                }
            }
        });
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// 32 random bytes, hex-encoded: opaque and unguessable.
fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedgate_store::MemoryStore;
    use std::collections::HashSet;

    fn user(org: Uuid) -> EnterpriseUser {
        EnterpriseUser {
            id: Uuid::new_v4(),
            organization_id: org,
            email: "a@acme.com".to_string(),
            first_name: None,
            last_name: None,
            groups: HashSet::new(),
            roles: HashSet::new(),
            is_active: true,
            sso_provider: Some(SsoProvider::Oidc),
            external_id: Some("idp-123".to_string()),
            last_login: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn manager() -> (Arc<SessionManager>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Arc::new(SessionManager::new(store.clone())), store)
    }

    #[tokio::test]
    async fn test_create_then_validate_refreshes_activity() {
        let (manager, _) = manager();
        let user = user(Uuid::new_v4());

        let session = manager
            .create(&user, 480, Some(SsoProvider::Oidc), None, None)
            .await
            .expect("create");
        assert_eq!(session.session_id.len(), 64);

        let validated = manager
            .validate(&session.session_id)
            .await
            .expect("valid session");
        assert_eq!(validated.user_id, user.id);
        assert!(validated.metadata.last_activity >= session.metadata.last_activity);
    }

    #[tokio::test]
    async fn test_unknown_session_is_none() {
        let (manager, _) = manager();
        assert!(manager.validate("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_none_and_evicted() {
        let (manager, store) = manager();
        let user = user(Uuid::new_v4());

        let session = manager
            .create(&user, 480, None, None, None)
            .await
            .expect("create");

        // Force the absolute TTL into the past.
        {
            let mut index = manager.index.write().await;
            let entry = index.get_mut(&session.session_id).expect("present");
            entry.expires_at = Utc::now() - Duration::seconds(1);
        }

        assert!(manager.validate(&session.session_id).await.is_none());
        // Lazy eviction removed it everywhere.
        assert!(manager.validate(&session.session_id).await.is_none());
        assert!(store.load_sessions().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn test_inactive_session_is_none_despite_future_expiry() {
        let (manager, _) = manager();
        let user = user(Uuid::new_v4());

        let session = manager
            .create(&user, 480, None, None, None)
            .await
            .expect("create");

        {
            let mut index = manager.index.write().await;
            let entry = index.get_mut(&session.session_id).expect("present");
            entry.metadata.last_activity =
                Utc::now() - Duration::minutes(480) - Duration::seconds(1);
        }

        assert!(manager.validate(&session.session_id).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let (manager, _) = manager();
        let user = user(Uuid::new_v4());

        let session = manager
            .create(&user, 480, None, None, None)
            .await
            .expect("create");

        manager
            .invalidate(&session.session_id)
            .await
            .expect("invalidate");
        manager
            .invalidate(&session.session_id)
            .await
            .expect("invalidate twice");
        assert!(manager.validate(&session.session_id).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_all_removes_only_that_user() {
        let (manager, _) = manager();
        let org = Uuid::new_v4();
        let alice = user(org);
        let bob = user(org);

        let a1 = manager.create(&alice, 480, None, None, None).await.expect("a1");
        let a2 = manager.create(&alice, 480, None, None, None).await.expect("a2");
        let b1 = manager.create(&bob, 480, None, None, None).await.expect("b1");

        let revoked = manager.invalidate_all(alice.id).await.expect("revoke");
        assert_eq!(revoked, 2);
        assert!(manager.validate(&a1.session_id).await.is_none());
        assert!(manager.validate(&a2.session_id).await.is_none());
        assert!(manager.validate(&b1.session_id).await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_evicts_expired_and_mirrors_deletes() {
        let (manager, store) = manager();
        let user = user(Uuid::new_v4());

        let stale = manager.create(&user, 480, None, None, None).await.expect("stale");
        let fresh = manager.create(&user, 480, None, None, None).await.expect("fresh");

        {
            let mut index = manager.index.write().await;
            let entry = index.get_mut(&stale.session_id).expect("present");
            entry.expires_at = Utc::now() - Duration::seconds(1);
        }

        let evicted = manager.sweep().await;
        assert_eq!(evicted, 1);
        assert!(manager.validate(&fresh.session_id).await.is_some());

        let remaining = store.load_sessions().await.expect("load");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].session_id, fresh.session_id);
    }

    #[tokio::test]
    async fn test_rehydrate_drops_expired_sessions() {
        let store = Arc::new(MemoryStore::new());
        let user = user(Uuid::new_v4());

        // Seed the mirror with one live and one expired session, as if a
        // previous process wrote them.
        let seed = Arc::new(SessionManager::new(store.clone()));
        let live = seed.create(&user, 480, None, None, None).await.expect("live");
        let dead = seed.create(&user, 480, None, None, None).await.expect("dead");
        let mut dead_mirror = dead.clone();
        dead_mirror.expires_at = Utc::now() - Duration::seconds(1);
        store.upsert_session(&dead_mirror).await.expect("seed dead");

        let manager = Arc::new(SessionManager::new(store));
        let restored = manager.rehydrate().await.expect("rehydrate");
        assert_eq!(restored, 1);
        assert!(manager.validate(&live.session_id).await.is_some());
        assert!(manager.validate(&dead.session_id).await.is_none());
    }
}
