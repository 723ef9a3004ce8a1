use anyhow::{Result, anyhow};
use async_trait::async_trait;
use mockall::automock;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

/// Sent once an order becomes paid.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderPaidNotification {
    pub order_id: Uuid,
    pub customer_name: String,
    pub product_name: Option<String>,
    pub amount: i64,
}

#[automock]
#[async_trait]
pub trait OrderNotifier {
    async fn order_paid(&self, notification: OrderPaidNotification) -> Result<()>;
}

/// Posts notifications to a configured endpoint; a no-op when none is set.
pub struct WebhookOrderNotifier {
    endpoint: Option<Url>,
    client: Client,
}

impl WebhookOrderNotifier {
    pub fn new(endpoint: Option<Url>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl OrderNotifier for WebhookOrderNotifier {
    async fn order_paid(&self, notification: OrderPaidNotification) -> Result<()> {
        let Some(endpoint) = self.endpoint.as_ref() else {
            debug!(
                order_id = %notification.order_id,
                "notifications: no endpoint configured, skipping order paid notification"
            );
            return Ok(());
        };

        let response = self
            .client
            .post(endpoint.clone())
            .json(&notification)
            .send()
            .await
            .map_err(|err| anyhow!("order notification request failed: {}", err.without_url()))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "order notification endpoint returned status {}",
                response.status()
            ));
        }

        info!(
            order_id = %notification.order_id,
            "notifications: order paid notification delivered"
        );
        Ok(())
    }
}
