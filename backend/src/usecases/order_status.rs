use std::sync::Arc;

use chrono::Utc;
use crates::domain::{
    repositories::{
        orders::OrderRepository, payments::PaymentRepository, status_cache::StatusCache,
    },
    value_objects::orders::OrderStatusView,
};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum OrderStatusError {
    #[error("no order or payment for external id {0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OrderStatusError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            OrderStatusError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderStatusError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub struct OrderStatusUseCase<P, O, C>
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    C: StatusCache + Send + Sync + 'static,
{
    payment_repo: Arc<P>,
    order_repo: Arc<O>,
    status_cache: Arc<C>,
}

impl<P, O, C> OrderStatusUseCase<P, O, C>
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    C: StatusCache + Send + Sync + 'static,
{
    pub fn new(payment_repo: Arc<P>, order_repo: Arc<O>, status_cache: Arc<C>) -> Self {
        Self {
            payment_repo,
            order_repo,
            status_cache,
        }
    }

    /// Payment row is authoritative; the order row may lag behind it.
    pub async fn get_status(&self, external_id: &str) -> Result<OrderStatusView, OrderStatusError> {
        if let Some(view) = self.status_cache.get(external_id).await {
            debug!(%external_id, "order_status: served from cache");
            return Ok(view);
        }

        let read_started = Utc::now();

        let payment = self
            .payment_repo
            .get_payment_by_external_id(external_id)
            .await
            .map_err(|err| {
                error!(%external_id, db_error = ?err, "order_status: failed to load payment");
                OrderStatusError::Internal(err)
            })?;
        let order = self
            .order_repo
            .get_order_by_external_id(external_id)
            .await
            .map_err(|err| {
                error!(%external_id, db_error = ?err, "order_status: failed to load order");
                OrderStatusError::Internal(err)
            })?;

        if payment.is_none() && order.is_none() {
            return Err(OrderStatusError::NotFound(external_id.to_string()));
        }

        let view = OrderStatusView::build(
            external_id,
            order.as_ref(),
            payment.as_ref().map(|payment| payment.status),
            payment.as_ref().and_then(|payment| payment.paid_at),
        );

        if view.reconciling {
            debug!(
                %external_id,
                order_status = ?view.order_status,
                payment_status = ?view.payment_status,
                "order_status: order lags payment, not caching"
            );
        } else {
            self.status_cache.put(view.clone(), read_started).await;
        }

        Ok(view)
    }
}
