use crate::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use fedgate_auth::{AuthError, AuthOutcome, AuthRequest};
use fedgate_models::{EnterpriseUser, SessionInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: Option<String>,
    pub token: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MfaVerifyRequest {
    pub challenge_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RevokeSessionsRequest {
    pub user_id: Uuid,
}

/// Terminal outcomes of a login attempt. Redirect-required and MFA-required
/// are successful-so-far states the caller routes to follow-up UI, so they
/// ride the success response, not the error path.
#[derive(Debug, Serialize)]
#[serde(tag = "status")]
pub enum LoginResponse {
    #[serde(rename = "authenticated")]
    Authenticated {
        code: &'static str,
        session_id: String,
        expires_at: DateTime<Utc>,
        user: EnterpriseUser,
    },
    #[serde(rename = "sso_redirect")]
    SsoRedirect {
        code: &'static str,
        authorization_url: String,
        state: String,
    },
    #[serde(rename = "mfa_required")]
    MfaRequired {
        code: &'static str,
        challenge_token: String,
    },
}

impl From<AuthOutcome> for LoginResponse {
    fn from(outcome: AuthOutcome) -> Self {
        match outcome {
            AuthOutcome::Authenticated { user, session } => LoginResponse::Authenticated {
                code: "AUTHENTICATED",
                session_id: session.session_id.clone(),
                expires_at: session.expires_at,
                user,
            },
            AuthOutcome::RedirectRequired {
                authorization_url,
                state,
            } => LoginResponse::SsoRedirect {
                code: "SSO_REDIRECT",
                authorization_url,
                state,
            },
            AuthOutcome::MfaRequired { challenge_token } => LoginResponse::MfaRequired {
                code: "MFA_REQUIRED",
                challenge_token,
            },
        }
    }
}

/// Translate typed auth failures into HTTP responses carrying the
/// machine-readable reason code.
pub fn auth_error_response(err: AuthError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        AuthError::InvalidToken(_) | AuthError::CredentialsInvalid => StatusCode::UNAUTHORIZED,
        AuthError::UserNotProvisioned => StatusCode::FORBIDDEN,
        AuthError::ConfigurationMissing | AuthError::ProtocolInitializationFailed(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AuthError::AlreadyExists(_) => StatusCode::CONFLICT,
        AuthError::NotFound(_) => StatusCode::NOT_FOUND,
        AuthError::UnauthorizedScim => StatusCode::UNAUTHORIZED,
        AuthError::UnsupportedScimOperation(_) => StatusCode::NOT_IMPLEMENTED,
        AuthError::Store(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(err.code(), &err.to_string())))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ErrorResponse>)> {
    request.validate().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("INVALID_REQUEST", &e.to_string())),
        )
    })?;

    let auth_request = AuthRequest {
        email: request.email,
        password: request.password,
        token: request.token,
        state: request.state,
        ip_address: client_ip(&headers),
        user_agent: user_agent(&headers),
    };

    let outcome = state
        .authenticator
        .authenticate(auth_request)
        .await
        .map_err(auth_error_response)?;

    Ok(Json(outcome.into()))
}

/// POST /api/auth/mfa/verify
pub async fn mfa_verify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<MfaVerifyRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ErrorResponse>)> {
    let outcome = state
        .authenticator
        .complete_mfa_challenge(
            &request.challenge_token,
            client_ip(&headers),
            user_agent(&headers),
        )
        .await
        .map_err(auth_error_response)?;

    Ok(Json(outcome.into()))
}

/// GET /api/auth/session — validate the bearer session id. Expired or
/// unknown sessions are a 401, not a 5xx.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SessionInfo>, (StatusCode, Json<ErrorResponse>)> {
    let session_id = bearer_token(&headers)?;

    match state.sessions.validate(&session_id).await {
        Some(session) => Ok(Json(session)),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "SESSION_EXPIRED",
                "Session is missing or expired",
            )),
        )),
    }
}

/// POST /api/auth/logout — idempotent.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let session_id = bearer_token(&headers)?;

    state
        .sessions
        .invalidate(&session_id)
        .await
        .map_err(auth_error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/sessions/revoke — admin revoke-all for a user.
pub async fn revoke_sessions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RevokeSessionsRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    let revoked = state
        .sessions
        .invalidate_all(request.user_id)
        .await
        .map_err(auth_error_response)?;

    Ok(Json(serde_json::json!({ "revoked": revoked })))
}

pub fn bearer_token(
    headers: &HeaderMap,
) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "MISSING_AUTH_HEADER",
                    "Authorization header is required",
                )),
            )
        })?;

    if !auth_header.to_lowercase().starts_with("bearer ") {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "INVALID_AUTH_SCHEME",
                "Authorization header must use Bearer scheme",
            )),
        ));
    }

    Ok(auth_header[7..].to_string())
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
