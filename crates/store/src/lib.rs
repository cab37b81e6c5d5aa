pub mod error;
pub mod memory;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;

use async_trait::async_trait;
use fedgate_models::{EnterpriseAuthConfig, EnterpriseUser, SessionInfo};
use uuid::Uuid;

/// The backing-store collaborator.
///
/// The relational store itself is outside this subsystem; consumers depend
/// only on these logical operations. Sessions written here are a durable
/// mirror of the in-memory index, consulted only to rehydrate on restart —
/// never on the per-request validation path.
///
/// Implementations must be thread-safe and handle concurrent access.
#[async_trait]
pub trait AuthStore: Send + Sync {
    // Configuration
    async fn read_config(&self, organization_id: Uuid) -> Result<Option<EnterpriseAuthConfig>>;
    async fn find_config_by_domain(&self, domain: &str) -> Result<Option<EnterpriseAuthConfig>>;
    async fn list_configs(&self) -> Result<Vec<EnterpriseAuthConfig>>;
    async fn write_config(&self, config: &EnterpriseAuthConfig) -> Result<()>;

    // Users
    async fn find_user_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<EnterpriseUser>>;
    async fn find_user_by_external_id(
        &self,
        organization_id: Uuid,
        external_id: &str,
    ) -> Result<Option<EnterpriseUser>>;
    async fn list_users(&self, organization_id: Uuid) -> Result<Vec<EnterpriseUser>>;
    async fn upsert_user(&self, user: &EnterpriseUser) -> Result<()>;

    // Sessions (durable mirror)
    async fn upsert_session(&self, session: &SessionInfo) -> Result<()>;
    async fn delete_session(&self, session_id: &str) -> Result<()>;
    async fn load_sessions(&self) -> Result<Vec<SessionInfo>>;
}
