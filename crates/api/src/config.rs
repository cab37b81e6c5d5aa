#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// External base URL, used for SCIM resource locations.
    pub base_url: String,
    /// Secret signing MFA challenge tokens.
    pub challenge_secret: String,
    /// Bearer token guarding the org-config admin endpoints.
    pub admin_token: String,
    pub discovery_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            challenge_secret: std::env::var("CHALLENGE_SECRET")
                .expect("CHALLENGE_SECRET must be set"),
            admin_token: std::env::var("ADMIN_TOKEN")
                .expect("ADMIN_TOKEN must be set"),
            discovery_timeout_secs: std::env::var("DISCOVERY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}
