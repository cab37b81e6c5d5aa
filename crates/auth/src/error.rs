use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// No federation configuration for the organization. Treated as
    /// "federation off", not as a fatal condition.
    #[error("no federation configuration for this organization")]
    ConfigurationMissing,

    /// Discovery fetch failed or the protocol config is malformed.
    /// Federation for the org is degraded until the next config reload.
    #[error("protocol initialization failed: {0}")]
    ProtocolInitializationFailed(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("user not provisioned and JIT provisioning is disabled")]
    UserNotProvisioned,

    #[error("invalid credentials")]
    CredentialsInvalid,

    #[error("SCIM request unauthorized")]
    UnauthorizedScim,

    #[error("unsupported SCIM operation: {0}")]
    UnsupportedScimOperation(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] fedgate_store::StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Machine-readable reason code carried across the authentication
    /// boundary. Callers translate these into user-facing messages.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::ConfigurationMissing => "CONFIGURATION_MISSING",
            AuthError::ProtocolInitializationFailed(_) => "PROTOCOL_INIT_FAILED",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::UserNotProvisioned => "USER_NOT_PROVISIONED",
            AuthError::CredentialsInvalid => "CREDENTIALS_INVALID",
            AuthError::UnauthorizedScim => "SCIM_UNAUTHORIZED",
            AuthError::UnsupportedScimOperation(_) => "SCIM_UNSUPPORTED",
            AuthError::AlreadyExists(_) => "ALREADY_EXISTS",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::Store(_) => "STORE_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => {
                AuthError::InvalidToken("token expired".to_string())
            }
            _ => AuthError::InvalidToken(err.to_string()),
        }
    }
}
