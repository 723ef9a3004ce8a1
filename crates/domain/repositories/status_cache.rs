use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::value_objects::orders::OrderStatusView;

/// Advisory cache for polled order status. Never authoritative.
#[automock]
#[async_trait]
pub trait StatusCache {
    async fn get(&self, external_id: &str) -> Option<OrderStatusView>;
    /// `read_started` is when the reads behind `view` began; a put racing a later
    /// invalidation is dropped.
    async fn put(&self, view: OrderStatusView, read_started: DateTime<Utc>);
    async fn invalidate(&self, external_id: &str);
}
