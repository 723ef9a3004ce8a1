use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::entities::payments::PaymentEntity;

use super::{
    channel_data::{ChannelData, PaymentData},
    enums::{payment_channels::PaymentChannel, payment_statuses::PaymentStatus},
    orders::OrderRecord,
};

/// One externally identified payment attempt.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub external_id: String,
    pub gateway_id: String,
    pub channel: PaymentChannel,
    pub channel_code: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub currency: String,
    pub channel_data: Option<ChannelData>,
    #[serde(skip_serializing)]
    pub gateway_response: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentEntity> for PaymentRecord {
    type Error = anyhow::Error;

    fn try_from(value: PaymentEntity) -> Result<Self> {
        let status = PaymentStatus::from_str(&value.status).ok_or_else(|| {
            anyhow!(
                "payment {} has unknown status {:?}",
                value.external_id,
                value.status
            )
        })?;
        let channel = PaymentChannel::from_str(&value.channel).ok_or_else(|| {
            anyhow!(
                "payment {} has unknown channel {:?}",
                value.external_id,
                value.channel
            )
        })?;
        let data = PaymentData::from_column(value.payment_data);

        Ok(Self {
            id: value.id,
            external_id: value.external_id,
            gateway_id: value.gateway_id,
            channel,
            channel_code: value.channel_code,
            status,
            amount: value.amount,
            currency: value.currency,
            channel_data: data.presentation,
            gateway_response: data.gateway_response,
            created_at: value.created_at,
            updated_at: value.updated_at,
            paid_at: value.paid_at,
        })
    }
}

/// Input of `upsert_payment`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentRecord {
    pub external_id: String,
    pub gateway_id: String,
    pub channel: PaymentChannel,
    pub channel_code: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub currency: String,
    pub channel_data: ChannelData,
    pub gateway_response: Value,
    pub paid_at: Option<DateTime<Utc>>,
}

impl NewPaymentRecord {
    pub fn payment_data(&self) -> PaymentData {
        PaymentData::new(self.channel_data.clone(), self.gateway_response.clone())
    }
}

/// A webhook-driven status change for one payment and its order.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentTransition {
    pub external_id: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    /// Webhook `data` object, stored next to the original gateway response.
    pub webhook_data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// Payment moved forward; `order` is `None` when no order row carries the external id.
    Applied {
        payment: PaymentRecord,
        order: Option<OrderRecord>,
    },
    /// The stored status did not allow the move (terminal, or a stale delivery).
    Skipped(PaymentRecord),
    NotFound,
}
