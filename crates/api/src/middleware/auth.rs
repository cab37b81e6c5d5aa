use crate::handlers::auth::{bearer_token, ErrorResponse};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;

/// Middleware guarding the org-config admin surface with the deployment's
/// admin bearer token.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let token = bearer_token(&headers)?;

    if token != state.config.admin_token {
        tracing::warn!("rejected admin request with invalid token");
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new(
                "INSUFFICIENT_PERMISSIONS",
                "This action requires the admin token",
            )),
        ));
    }

    Ok(next.run(request).await)
}
