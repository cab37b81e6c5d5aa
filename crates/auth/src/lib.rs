pub mod challenge;
pub mod config_store;
pub mod discovery;
pub mod error;
pub mod provisioning;
pub mod roles;
pub mod session;
pub mod sso;
pub mod standard;
pub mod validator;

pub use challenge::{ChallengeClaims, ChallengeService};
pub use config_store::{ConfigStore, ProtocolState};
pub use discovery::{DiscoveryClient, DiscoveryDocument};
pub use error::{AuthError, Result};
pub use provisioning::UserProvisioningEngine;
pub use roles::{map_roles, DEFAULT_ROLE};
pub use session::{SessionManager, SWEEP_INTERVAL};
pub use sso::{AuthOutcome, AuthRequest, SsoAuthenticator};
pub use standard::{DenyAllVerifier, PasswordVerifier, StaticPasswordVerifier, VerifiedIdentity};
pub use validator::{
    AssertionVerifier, BindVerifier, OidcValidator, TokenValidator, ValidatorSet,
};
