use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Identity returned by the standard-auth collaborator on a successful
/// password verification.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Set when the collaborator already knows the user.
    pub user_id: Option<Uuid>,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// The standard-auth collaborator. Credential storage and hashing live
/// outside this subsystem; only the verification outcome crosses the
/// boundary. `None` means the credentials did not match.
#[async_trait]
pub trait PasswordVerifier: Send + Sync {
    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<VerifiedIdentity>>;
}

/// Rejects every credential. The default when no standard-auth delegate is
/// wired in, e.g. a federation-only deployment.
pub struct DenyAllVerifier;

#[async_trait]
impl PasswordVerifier for DenyAllVerifier {
    async fn verify_password(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<Option<VerifiedIdentity>> {
        Ok(None)
    }
}

/// Fixed email/password pair for tests and local development.
pub struct StaticPasswordVerifier {
    email: String,
    password: String,
}

impl StaticPasswordVerifier {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl PasswordVerifier for StaticPasswordVerifier {
    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<VerifiedIdentity>> {
        if email == self.email && password == self.password {
            Ok(Some(VerifiedIdentity {
                user_id: None,
                email: email.to_string(),
                first_name: None,
                last_name: None,
            }))
        } else {
            Ok(None)
        }
    }
}
