pub mod claims;
pub mod config;
pub mod scim;
pub mod session;
pub mod user;

pub use claims::NormalizedClaims;
pub use config::{
    ClaimMappings, ConfigUpdate, EnterpriseAuthConfig, LdapConfig, OidcConfig, SamlConfig,
    ScimConfig, SsoProvider, DEFAULT_SESSION_TIMEOUT_MINUTES,
};
pub use scim::{
    CreateScimUser, ScimEmail, ScimError, ScimGroupRef, ScimListResponse, ScimMeta, ScimName,
    ScimUser, ServiceProviderConfig,
};
pub use session::{SessionInfo, SessionMetadata};
pub use user::EnterpriseUser;
