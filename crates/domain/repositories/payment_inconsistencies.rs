use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::{
    enums::inconsistency_kinds::InconsistencyKind,
    inconsistencies::{InconsistencyRecord, NewInconsistency},
};

#[automock]
#[async_trait]
pub trait InconsistencyRepository {
    /// No-op when an unresolved entry of the same kind already exists for the id.
    async fn record(&self, inconsistency: NewInconsistency) -> Result<()>;
    async fn resolve_open(&self, external_id: &str, kinds: Vec<InconsistencyKind>)
    -> Result<usize>;
    async fn list_open(&self, limit: i64) -> Result<Vec<InconsistencyRecord>>;
}
