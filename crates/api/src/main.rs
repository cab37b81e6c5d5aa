// FedGate API Server
// Identity federation and session lifecycle for enterprise organizations.

mod config;
mod handlers;
mod middleware;
mod routes;

use config::Config;
use dotenvy::dotenv;
use fedgate_auth::{
    ChallengeService, ConfigStore, DenyAllVerifier, DiscoveryClient, SessionManager,
    SsoAuthenticator, UserProvisioningEngine, ValidatorSet, SWEEP_INTERVAL,
};
use fedgate_store::{AuthStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn AuthStore>,
    pub configs: Arc<ConfigStore>,
    pub provisioning: Arc<UserProvisioningEngine>,
    pub sessions: Arc<SessionManager>,
    pub authenticator: Arc<SsoAuthenticator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,fedgate_api=debug,tower_http=debug".to_string()),
        )
        .init();

    tracing::info!("🚀 Starting FedGate API server");
    tracing::info!("📦 Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env();
    tracing::info!("🔌 Server: {}:{}", config.server_host, config.server_port);

    // Backing store. The relational store is an external collaborator;
    // this deployment runs the in-memory implementation.
    let store: Arc<dyn AuthStore> = Arc::new(MemoryStore::new());

    // Config store with bounded discovery fetches
    let discovery = DiscoveryClient::new(Duration::from_secs(config.discovery_timeout_secs));
    let configs = Arc::new(ConfigStore::new(store.clone(), discovery));
    tracing::info!("🗂️  Config store initialized");

    // Provisioning engine
    let provisioning = Arc::new(UserProvisioningEngine::new(store.clone()));

    // Session manager: rehydrate the index from the durable mirror, then
    // start the periodic sweep.
    let sessions = Arc::new(SessionManager::new(store.clone()));
    sessions.rehydrate().await?;
    sessions.clone().start_sweep(SWEEP_INTERVAL);
    tracing::info!("⏱️  Session manager initialized, sweep every {:?}", SWEEP_INTERVAL);

    // SSO authenticator. No standard-auth delegate is wired in by default;
    // federation-only deployments reject password logins outright.
    let challenges = ChallengeService::new(&config.challenge_secret);
    let authenticator = Arc::new(SsoAuthenticator::new(
        configs.clone(),
        provisioning.clone(),
        sessions.clone(),
        challenges,
        ValidatorSet::default(),
        Arc::new(DenyAllVerifier),
    ));
    tracing::info!("🔐 SSO authenticator initialized");

    // Create app state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        configs,
        provisioning,
        sessions: sessions.clone(),
        authenticator,
    });

    // Create router
    let app = routes::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("✅ Server ready at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sessions))
        .await?;

    Ok(())
}

async fn shutdown_signal(sessions: Arc<SessionManager>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down, stopping session sweep");
    sessions.shutdown();
}
