use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    usecases::{
        order_status::OrderStatusUseCase, payment_webhook::PaymentWebhookUseCase,
        payments::PaymentUseCase,
    },
};
use anyhow::{Context, Result};
use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    routing::get,
};
use crates::{
    domain::value_objects::channel_catalog::ChannelCatalog,
    infra::{
        cache::in_memory_status_cache::InMemoryStatusCache,
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                orders::OrderPostgres, payment_inconsistencies::InconsistencyPostgres,
                payments::PaymentPostgres, products::ProductPostgres,
            },
        },
    },
    notifications::order_notifier::WebhookOrderNotifier,
    payments::xendit_client::{XenditClient, XenditSettings},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use url::Url;

use super::routers::payment_webhook::CALLBACK_TOKEN_HEADER;

pub fn load_channel_catalog(config: &DotEnvyConfig) -> Result<ChannelCatalog> {
    match config.payment.channels_path.as_deref() {
        Some(path) => {
            let catalog = ChannelCatalog::from_json_file(path)?;
            info!(
                path,
                entries = catalog.entries().len(),
                "channel catalog loaded from file"
            );
            Ok(catalog)
        }
        None => Ok(ChannelCatalog::default()),
    }
}

pub fn gateway_settings(config: &DotEnvyConfig) -> XenditSettings {
    XenditSettings {
        base_url: config.gateway.base_url.clone(),
        secret_key: config.gateway.secret_key.clone(),
        timeout: Duration::from_secs(config.gateway.timeout_secs),
        country: config.gateway.country.clone(),
        success_return_url: config.payment.success_return_url.clone(),
        failure_return_url: config.payment.failure_return_url.clone(),
        expiry: chrono::Duration::minutes(config.payment.expiry_minutes),
    }
}

fn api_routes(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> Result<Router> {
    let payment_repository = Arc::new(PaymentPostgres::new(Arc::clone(&db_pool)));
    let order_repository = Arc::new(OrderPostgres::new(Arc::clone(&db_pool)));
    let inconsistency_repository = Arc::new(InconsistencyPostgres::new(Arc::clone(&db_pool)));
    let product_repository = Arc::new(ProductPostgres::new(Arc::clone(&db_pool)));

    let catalog = Arc::new(load_channel_catalog(config)?);
    let gateway = Arc::new(XenditClient::new(gateway_settings(config))?);
    let status_cache_ttl = config.status_cache.effective_ttl();
    if status_cache_ttl.is_zero() {
        info!("order status cache disabled");
    }
    let status_cache = Arc::new(InMemoryStatusCache::new(status_cache_ttl));
    let notify_endpoint = config
        .notifications
        .order_webhook_url
        .as_deref()
        .map(Url::parse)
        .transpose()
        .context("ORDER_NOTIFY_WEBHOOK_URL is invalid")?;
    let notifier = Arc::new(WebhookOrderNotifier::new(notify_endpoint)?);

    let payments_usecase = PaymentUseCase::new(
        Arc::clone(&payment_repository),
        Arc::clone(&order_repository),
        Arc::clone(&inconsistency_repository),
        Arc::clone(&product_repository),
        gateway,
        catalog,
    );
    let order_status_usecase = OrderStatusUseCase::new(
        Arc::clone(&payment_repository),
        Arc::clone(&order_repository),
        Arc::clone(&status_cache),
    );
    let webhook_usecase = PaymentWebhookUseCase::new(
        payment_repository,
        inconsistency_repository,
        status_cache,
        notifier,
        product_repository,
        config.gateway.callback_token.clone(),
    );

    Ok(Router::new()
        .merge(routers::payments::routes(Arc::new(payments_usecase)))
        .merge(routers::orders::routes(Arc::new(order_status_usecase)))
        .merge(routers::payment_webhook::routes(Arc::new(webhook_usecase)))
        .route("/health-check", get(default_routers::health_check)))
}

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/v1", api_routes(&config, db_pool)?)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([CONTENT_TYPE, HeaderName::from_static(CALLBACK_TOKEN_HEADER)])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
