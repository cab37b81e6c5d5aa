//! Organization federation-config admin endpoints. All of these sit behind
//! the admin bearer middleware.

use crate::handlers::auth::{auth_error_response, ErrorResponse};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use fedgate_models::{ConfigUpdate, EnterpriseAuthConfig, EnterpriseUser};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// GET /api/orgs/:org_id/config
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<EnterpriseAuthConfig>, (StatusCode, Json<ErrorResponse>)> {
    let config = state
        .configs
        .get(org_id)
        .await
        .map_err(auth_error_response)?;
    Ok(Json(config))
}

/// PUT /api/orgs/:org_id/config — create or replace, then re-initialize
/// the active protocol.
pub async fn put_config(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
    Json(config): Json<EnterpriseAuthConfig>,
) -> Result<Json<EnterpriseAuthConfig>, (StatusCode, Json<ErrorResponse>)> {
    if config.organization_id != org_id {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "INVALID_REQUEST",
                "organization_id does not match path",
            )),
        ));
    }
    config.validate().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("INVALID_REQUEST", &e.to_string())),
        )
    })?;

    let config = state
        .configs
        .upsert(config)
        .await
        .map_err(auth_error_response)?;
    tracing::info!(organization_id = %org_id, provider = %config.sso_provider, "org config replaced");
    Ok(Json(config))
}

/// PATCH /api/orgs/:org_id/config — partial update.
pub async fn patch_config(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<EnterpriseAuthConfig>, (StatusCode, Json<ErrorResponse>)> {
    let config = state
        .configs
        .update(org_id, update)
        .await
        .map_err(auth_error_response)?;
    Ok(Json(config))
}

/// POST /api/orgs/:org_id/users/:external_id/deactivate
/// The only path out of the active state; users are never hard-deleted.
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    Path((org_id, external_id)): Path<(Uuid, String)>,
) -> Result<Json<EnterpriseUser>, (StatusCode, Json<ErrorResponse>)> {
    let user = state
        .provisioning
        .deactivate(org_id, &external_id)
        .await
        .map_err(auth_error_response)?;
    Ok(Json(user))
}
