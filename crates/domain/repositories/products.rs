use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[automock]
#[async_trait]
pub trait ProductRepository {
    async fn find_name(&self, product_id: Uuid) -> Result<Option<String>>;
}
