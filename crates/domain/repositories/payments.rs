use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::value_objects::payments::{
    NewPaymentRecord, PaymentRecord, PaymentTransition, TransitionOutcome,
};

#[automock]
#[async_trait]
pub trait PaymentRepository {
    /// Insert-or-merge keyed on `external_id`; never creates a second row.
    async fn upsert_payment(&self, payment: NewPaymentRecord) -> Result<PaymentRecord>;
    async fn get_payment_by_external_id(&self, external_id: &str)
    -> Result<Option<PaymentRecord>>;
    /// Moves the payment and its order forward in one transaction.
    async fn apply_webhook_transition(
        &self,
        transition: PaymentTransition,
    ) -> Result<TransitionOutcome>;
    async fn find_payments_without_order(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentRecord>>;
}
