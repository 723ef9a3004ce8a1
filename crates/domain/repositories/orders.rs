use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::orders::{NewOrderRecord, OrderRecord};

#[automock]
#[async_trait]
pub trait OrderRepository {
    /// Keyed on `client_external_id` when present, plain insert otherwise.
    async fn upsert_order(&self, order: NewOrderRecord) -> Result<OrderRecord>;
    async fn get_order_by_external_id(&self, external_id: &str) -> Result<Option<OrderRecord>>;
    /// Returns the stored order and whether this call created it.
    async fn insert_order_if_absent(&self, order: NewOrderRecord) -> Result<(OrderRecord, bool)>;
}
