//! SCIM 2.0 gateway
//!
//! Lets identity providers like Okta, Azure AD and OneLogin push user
//! lifecycle events directly into provisioning, outside the interactive
//! login path. Only list/get/create are implemented; PUT, PATCH and
//! DELETE deliberately return 501 so provider-side sync jobs can detect
//! and alert on the gap instead of believing a silent no-op.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use fedgate_auth::AuthError;
use fedgate_models::{
    CreateScimUser, EnterpriseAuthConfig, EnterpriseUser, ScimEmail, ScimError, ScimGroupRef,
    ScimListResponse, ScimMeta, ScimName, ScimUser, ServiceProviderConfig,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ScimListQuery {
    /// 1-based starting index
    #[serde(rename = "startIndex", default = "default_start_index")]
    pub start_index: i64,
    #[serde(default = "default_count")]
    pub count: i64,
}

fn default_start_index() -> i64 {
    1
}

fn default_count() -> i64 {
    100
}

/// GET /scim/v2/ServiceProviderConfig
/// Advertises exactly what this gateway supports.
pub async fn service_provider_config() -> impl IntoResponse {
    Json(ServiceProviderConfig::default())
}

/// GET /scim/v2/Users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ScimListQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ScimError>)> {
    let config = authenticate_scim(&state, &headers).await?;
    let base_url = &state.config.base_url;

    let users = state
        .provisioning
        .list_active(config.organization_id)
        .await
        .map_err(provisioning_error)?;

    let total = users.len() as i64;
    let offset = (query.start_index - 1).max(0) as usize;
    let resources: Vec<ScimUser> = users
        .iter()
        .skip(offset)
        .take(query.count.max(0) as usize)
        .map(|u| user_to_scim(u, base_url))
        .collect();

    Ok(Json(ScimListResponse::new(
        resources,
        total,
        query.start_index,
        query.count,
    )))
}

/// GET /scim/v2/Users/:external_id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(external_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ScimError>)> {
    let config = authenticate_scim(&state, &headers).await?;

    let user = state
        .provisioning
        .find_by_external_id(config.organization_id, &external_id)
        .await
        .map_err(provisioning_error)?
        .ok_or_else(|| scim_error(ScimError::not_found("User not found")))?;

    Ok(Json(user_to_scim(&user, &state.config.base_url)))
}

/// POST /scim/v2/Users
/// The identity provider is the authority: creation is always allowed when
/// SCIM is enabled, regardless of the JIT setting.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateScimUser>,
) -> Result<impl IntoResponse, (StatusCode, Json<ScimError>)> {
    let config = authenticate_scim(&state, &headers).await?;

    let user = state
        .provisioning
        .scim_create(&config, &request)
        .await
        .map_err(|e| match e {
            AuthError::AlreadyExists(detail) => scim_error(ScimError::conflict(detail)),
            other => provisioning_error(other),
        })?;

    tracing::info!(organization_id = %config.organization_id, user_id = %user.id, "SCIM user created");
    Ok((
        StatusCode::CREATED,
        Json(user_to_scim(&user, &state.config.base_url)),
    ))
}

/// PUT /scim/v2/Users/:external_id — not supported in this design pass.
pub async fn replace_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(_external_id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ScimError>)> {
    authenticate_scim(&state, &headers).await?;
    Err(scim_error(ScimError::unsupported("PUT")))
}

/// PATCH /scim/v2/Users/:external_id — not supported in this design pass.
pub async fn patch_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(_external_id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ScimError>)> {
    authenticate_scim(&state, &headers).await?;
    Err(scim_error(ScimError::unsupported("PATCH")))
}

/// DELETE /scim/v2/Users/:external_id — not supported; deactivation is an
/// explicit admin transition, never a SCIM delete.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(_external_id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ScimError>)> {
    authenticate_scim(&state, &headers).await?;
    Err(scim_error(ScimError::unsupported("DELETE")))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Authenticate a SCIM request: the bearer token's SHA-256 digest must
/// match an organization with SCIM enabled.
async fn authenticate_scim(
    state: &Arc<AppState>,
    headers: &HeaderMap,
) -> Result<EnterpriseAuthConfig, (StatusCode, Json<ScimError>)> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| scim_error(ScimError::unauthorized()))?;

    if !auth_header.to_lowercase().starts_with("bearer ") {
        return Err(scim_error(ScimError::unauthorized()));
    }

    let token_hash = hash_token(&auth_header[7..]);

    let configs = state
        .store
        .list_configs()
        .await
        .map_err(|e| scim_error(ScimError::new(500, format!("Store error: {}", e))))?;

    configs
        .into_iter()
        .find(|c| {
            c.scim
                .as_ref()
                .map(|s| s.enabled && s.bearer_token_hash == token_hash)
                .unwrap_or(false)
        })
        .ok_or_else(|| scim_error(ScimError::unauthorized()))
}

fn scim_error(error: ScimError) -> (StatusCode, Json<ScimError>) {
    (
        StatusCode::from_u16(error.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(error),
    )
}

fn provisioning_error(err: AuthError) -> (StatusCode, Json<ScimError>) {
    tracing::error!(error = %err, "SCIM provisioning error");
    scim_error(ScimError::new(500, err.to_string()))
}

/// Hash a token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Convert a user record to its SCIM resource shape.
fn user_to_scim(user: &EnterpriseUser, base_url: &str) -> ScimUser {
    let name = if user.first_name.is_some() || user.last_name.is_some() {
        Some(ScimName {
            given_name: user.first_name.clone(),
            family_name: user.last_name.clone(),
            formatted: Some(user.display_name()),
        })
    } else {
        None
    };

    let mut groups: Vec<ScimGroupRef> = user
        .groups
        .iter()
        .map(|g| ScimGroupRef {
            value: g.clone(),
            display: Some(g.clone()),
        })
        .collect();
    groups.sort_by(|a, b| a.value.cmp(&b.value));

    ScimUser {
        schemas: ScimUser::schemas(),
        id: user.id.to_string(),
        external_id: user.external_id.clone(),
        user_name: user.email.clone(),
        display_name: Some(user.display_name()),
        name,
        emails: vec![ScimEmail {
            value: user.email.clone(),
            email_type: Some("work".to_string()),
            primary: true,
        }],
        active: user.is_active,
        groups,
        meta: ScimMeta::new(
            "User",
            user.created_at,
            user.updated_at,
            base_url,
            &user.id.to_string(),
        ),
    }
}
