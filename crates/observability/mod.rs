mod config;
mod dispatcher;
mod layer;
mod webhook;

use anyhow::Result;
use config::ObservabilityConfig;
use dispatcher::{AlertDispatcher, AlertSink};
use layer::AlertLayer;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use webhook::WebhookAlertSink;

/// Installs the global subscriber: RUST_LOG filter, local-time formatter and,
/// when `ALERT_WEBHOOK_URL` is set, the alert layer. Must run inside a tokio runtime.
pub fn init_observability(component: &str) -> Result<()> {
    let mut config = ObservabilityConfig::from_env(component);

    let alert_layer = match config.alert.as_ref() {
        Some(alert) => match WebhookAlertSink::new(alert.webhook_url.clone()) {
            Ok(sink) => {
                let sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(sink)];
                Some(
                    AlertLayer::new(
                        AlertDispatcher::spawn(sinks),
                        config.service_context.clone(),
                        alert.min_level,
                    )
                    .with_filter(tracing_subscriber::filter::LevelFilter::from_level(
                        alert.min_level,
                    )),
                )
            }
            Err(err) => {
                config
                    .warnings
                    .push(format!("alert webhook client could not be built: {err}"));
                None
            }
        },
        None => None,
    };
    let alerts_enabled = alert_layer.is_some();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Local time so `TZ=Asia/Jakarta` logs show `+07:00`.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %config.service_context.service_name,
        environment = %config.service_context.environment,
        component = %config.service_context.component,
        alerts_enabled,
        "observability: tracing initialised"
    );

    Ok(())
}
