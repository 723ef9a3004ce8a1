use std::{env, str::FromStr};

use anyhow::{Context, Result};

use super::config_model::{
    BackendServer, Database, DotEnvyConfig, Gateway, Notifications, Payment, Recovery,
    StatusCache,
};

const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.xendit.co";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required_parse("SERVER_PORT_BACKEND")?,
        body_limit: required_parse("SERVER_BODY_LIMIT")?,
        timeout: required_parse("SERVER_TIMEOUT")?,
    };

    let gateway = Gateway {
        base_url: optional("GATEWAY_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GATEWAY_BASE_URL.to_string()),
        secret_key: required("GATEWAY_SECRET_KEY")?,
        callback_token: required("GATEWAY_CALLBACK_TOKEN")?,
        timeout_secs: optional_parse("GATEWAY_TIMEOUT_SECS", 15)?,
        country: optional("GATEWAY_COUNTRY").unwrap_or_else(|| "ID".to_string()),
    };

    let payment = Payment {
        success_return_url: required("PAYMENT_SUCCESS_RETURN_URL")?,
        failure_return_url: required("PAYMENT_FAILURE_RETURN_URL")?,
        expiry_minutes: optional_parse("PAYMENT_EXPIRY_MINUTES", 1440)?,
        channels_path: optional("PAYMENT_CHANNELS_PATH"),
    };

    let notifications = Notifications {
        order_webhook_url: optional("ORDER_NOTIFY_WEBHOOK_URL"),
    };

    let status_cache = StatusCache {
        ttl_seconds: optional_parse("STATUS_CACHE_TTL_SECONDS", 10)?,
        single_instance: optional_parse("STATUS_CACHE_SINGLE_INSTANCE", false)?,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database: load_database()?,
        gateway,
        payment,
        notifications,
        status_cache,
        recovery: load_recovery()?,
    })
}

/// Subset used by the operator tooling, which never talks to the gateway.
pub fn load_database() -> Result<Database> {
    dotenvy::dotenv().ok();

    Ok(Database {
        url: required("DATABASE_URL")?,
    })
}

pub fn load_recovery() -> Result<Recovery> {
    dotenvy::dotenv().ok();

    Ok(Recovery {
        grace_minutes: optional_parse("RECOVERY_GRACE_MINUTES", 30)?,
    })
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is invalid"))
}

fn required_parse<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    required(key)?
        .parse()
        .with_context(|| format!("{key} is invalid"))
}

fn optional_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}
