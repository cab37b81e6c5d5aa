use crate::handlers;
use crate::middleware;
use crate::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        // Authentication entry point - Public endpoints
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/mfa/verify", post(handlers::auth::mfa_verify))
        .route("/api/auth/session", get(handlers::auth::get_session))
        .route("/api/auth/logout", post(handlers::auth::logout))
        // Session administration - Protected
        .route(
            "/api/auth/sessions/revoke",
            post(handlers::auth::revoke_sessions)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_admin)),
        )
        // Organization federation config - Protected
        .route(
            "/api/orgs/:org_id/config",
            get(handlers::orgs::get_config)
                .put(handlers::orgs::put_config)
                .patch(handlers::orgs::patch_config)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_admin)),
        )
        .route(
            "/api/orgs/:org_id/users/:external_id/deactivate",
            post(handlers::orgs::deactivate_user)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_admin)),
        )
        // SCIM 2.0 gateway - bearer-token authenticated per organization
        .route(
            "/scim/v2/ServiceProviderConfig",
            get(handlers::scim::service_provider_config),
        )
        .route(
            "/scim/v2/Users",
            get(handlers::scim::list_users).post(handlers::scim::create_user),
        )
        .route(
            "/scim/v2/Users/:external_id",
            get(handlers::scim::get_user)
                .put(handlers::scim::replace_user)
                .patch(handlers::scim::patch_user)
                .delete(handlers::scim::delete_user),
        )
        .with_state(state)
}
