use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub gateway: Gateway,
    pub payment: Payment,
    pub notifications: Notifications,
    pub status_cache: StatusCache,
    pub recovery: Recovery,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Gateway {
    pub base_url: String,
    pub secret_key: String,
    pub callback_token: String,
    pub timeout_secs: u64,
    pub country: String,
}

#[derive(Debug, Clone)]
pub struct Payment {
    pub success_return_url: String,
    pub failure_return_url: String,
    pub expiry_minutes: i64,
    /// JSON catalog replacing the built-in channel list.
    pub channels_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    pub order_webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatusCache {
    pub ttl_seconds: u64,
    /// Webhooks and recovery only invalidate entries held by their own process.
    pub single_instance: bool,
}

impl StatusCache {
    /// Zero disables caching.
    pub fn effective_ttl(&self) -> Duration {
        if self.single_instance {
            Duration::from_secs(self.ttl_seconds)
        } else {
            Duration::ZERO
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recovery {
    pub grace_minutes: i64,
}
