use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::orders::OrderEntity;

use super::enums::{
    order_statuses::OrderStatus,
    order_types::{OrderSource, OrderType},
    payment_statuses::PaymentStatus,
};

pub const RECOVERED_CUSTOMER_NAME: &str = "Recovered customer";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl CustomerInfo {
    /// Placeholder used when an order is rebuilt from a payment alone.
    pub fn recovered() -> Self {
        Self {
            name: RECOVERED_CUSTOMER_NAME.to_string(),
            email: String::new(),
            phone: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderRecord {
    pub id: Uuid,
    pub client_external_id: Option<String>,
    pub product_id: Option<Uuid>,
    pub customer: CustomerInfo,
    pub order_type: OrderType,
    pub rental_duration: Option<i32>,
    pub amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub source: OrderSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl OrderRecord {
    pub fn is_recovered(&self) -> bool {
        self.source == OrderSource::GatewayRecovery
    }
}

impl TryFrom<OrderEntity> for OrderRecord {
    type Error = anyhow::Error;

    fn try_from(value: OrderEntity) -> Result<Self> {
        let status = OrderStatus::from_str(&value.status)
            .ok_or_else(|| anyhow!("order {} has unknown status {:?}", value.id, value.status))?;
        let order_type = OrderType::from_str(&value.order_type).ok_or_else(|| {
            anyhow!(
                "order {} has unknown order type {:?}",
                value.id,
                value.order_type
            )
        })?;
        let source = OrderSource::from_str(&value.source).unwrap_or_default();

        Ok(Self {
            id: value.id,
            client_external_id: value.client_external_id,
            product_id: value.product_id,
            customer: CustomerInfo {
                name: value.customer_name,
                email: value.customer_email,
                phone: value.customer_phone,
            },
            order_type,
            rental_duration: value.rental_duration,
            amount: value.amount,
            currency: value.currency,
            status,
            source,
            created_at: value.created_at,
            updated_at: value.updated_at,
            paid_at: value.paid_at,
        })
    }
}

/// Input of `upsert_order`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderRecord {
    pub client_external_id: Option<String>,
    pub product_id: Option<Uuid>,
    pub customer: CustomerInfo,
    pub order_type: OrderType,
    pub rental_duration: Option<i32>,
    pub amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub source: OrderSource,
    pub paid_at: Option<DateTime<Utc>>,
}

/// What the storefront polls while waiting for a payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderStatusView {
    pub external_id: String,
    pub order_id: Option<Uuid>,
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// `paid` once the payment is paid, even while the order row still says `pending`.
    pub display_status: String,
    pub paid_at: Option<DateTime<Utc>>,
    /// Payment and order disagree; a webhook is still being applied.
    pub reconciling: bool,
}

impl OrderStatusView {
    pub fn build(
        external_id: &str,
        order: Option<&OrderRecord>,
        payment_status: Option<PaymentStatus>,
        payment_paid_at: Option<DateTime<Utc>>,
    ) -> Self {
        let order_status = order.map(|order| order.status);
        let mirrored = payment_status.map(|status| status.order_status());

        let display = match (payment_status, order_status) {
            (Some(PaymentStatus::Paid), _) | (_, Some(OrderStatus::Paid)) => OrderStatus::Paid,
            (_, Some(status)) if status.is_terminal() => status,
            (Some(status), _) => status.order_status(),
            (None, Some(status)) => status,
            (None, None) => OrderStatus::Pending,
        };

        let reconciling = match (order_status, mirrored) {
            (Some(order_status), Some(mirrored)) => order_status != mirrored,
            _ => false,
        };

        Self {
            external_id: external_id.to_string(),
            order_id: order.map(|order| order.id),
            order_status,
            payment_status,
            display_status: display.to_string(),
            paid_at: order
                .and_then(|order| order.paid_at)
                .or(payment_paid_at),
            reconciling,
        }
    }
}
