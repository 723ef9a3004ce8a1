use std::sync::Arc;

use crates::{
    domain::{
        repositories::{
            payment_inconsistencies::InconsistencyRepository, payments::PaymentRepository,
            products::ProductRepository, status_cache::StatusCache,
        },
        value_objects::{
            enums::{inconsistency_kinds::InconsistencyKind, payment_statuses::PaymentStatus},
            inconsistencies::NewInconsistency,
            orders::OrderRecord,
            payment_webhook::PaymentWebhookPayload,
            payments::{PaymentRecord, PaymentTransition, TransitionOutcome},
        },
    },
    notifications::order_notifier::{OrderNotifier, OrderPaidNotification},
    payments::xendit_client::verify_callback_token,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("callback token missing or invalid")]
    Unauthorized,
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
    #[error("no payment for external id {0}")]
    UnknownPayment(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            WebhookError::Unauthorized => StatusCode::UNAUTHORIZED,
            // Acknowledged so the gateway stops retrying something that will never apply.
            WebhookError::InvalidPayload(_) | WebhookError::UnknownPayment(_) => StatusCode::OK,
            WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, WebhookError>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookAck {
    pub accepted: bool,
    pub external_id: String,
    pub status: PaymentStatus,
    /// False for duplicate, stale or post-terminal deliveries.
    pub applied: bool,
}

pub struct PaymentWebhookUseCase<P, I, C, N, Pr>
where
    P: PaymentRepository + Send + Sync + 'static,
    I: InconsistencyRepository + Send + Sync + 'static,
    C: StatusCache + Send + Sync + 'static,
    N: OrderNotifier + Send + Sync + 'static,
    Pr: ProductRepository + Send + Sync + 'static,
{
    payment_repo: Arc<P>,
    inconsistency_repo: Arc<I>,
    status_cache: Arc<C>,
    notifier: Arc<N>,
    product_repo: Arc<Pr>,
    callback_token: String,
}

impl<P, I, C, N, Pr> PaymentWebhookUseCase<P, I, C, N, Pr>
where
    P: PaymentRepository + Send + Sync + 'static,
    I: InconsistencyRepository + Send + Sync + 'static,
    C: StatusCache + Send + Sync + 'static,
    N: OrderNotifier + Send + Sync + 'static,
    Pr: ProductRepository + Send + Sync + 'static,
{
    pub fn new(
        payment_repo: Arc<P>,
        inconsistency_repo: Arc<I>,
        status_cache: Arc<C>,
        notifier: Arc<N>,
        product_repo: Arc<Pr>,
        callback_token: String,
    ) -> Self {
        Self {
            payment_repo,
            inconsistency_repo,
            status_cache,
            notifier,
            product_repo,
            callback_token,
        }
    }

    pub async fn handle_callback(
        &self,
        payload: &[u8],
        callback_token: Option<&str>,
    ) -> UseCaseResult<WebhookAck> {
        let provided = callback_token.unwrap_or_default();
        if !verify_callback_token(&self.callback_token, provided) {
            warn!(
                security_event = true,
                token_present = callback_token.is_some(),
                status = WebhookError::Unauthorized.status_code().as_u16(),
                "payment_webhook: callback token verification failed"
            );
            return Err(WebhookError::Unauthorized);
        }

        let webhook: PaymentWebhookPayload = serde_json::from_slice(payload).map_err(|err| {
            warn!(error = %err, "payment_webhook: payload is not valid json");
            WebhookError::InvalidPayload(err.to_string())
        })?;

        let external_id = webhook
            .external_id()
            .map(str::to_string)
            .ok_or_else(|| {
                warn!(event = ?webhook.event, "payment_webhook: payload has no external id");
                WebhookError::InvalidPayload("missing external id".to_string())
            })?;
        let gateway_status = webhook.gateway_status().ok_or_else(|| {
            warn!(%external_id, "payment_webhook: payload has no status");
            WebhookError::InvalidPayload("missing status".to_string())
        })?;
        let status = PaymentStatus::from_gateway(&gateway_status);

        info!(
            %external_id,
            gateway_id = ?webhook.data.id,
            gateway_status = %gateway_status,
            status = %status,
            "payment_webhook: callback received"
        );

        let current = self
            .payment_repo
            .get_payment_by_external_id(&external_id)
            .await
            .map_err(|err| {
                error!(%external_id, db_error = ?err, "payment_webhook: failed to load payment");
                WebhookError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%external_id, "payment_webhook: no local payment for callback");
                WebhookError::UnknownPayment(external_id.clone())
            })?;

        warn_on_amount_mismatch(&current, &webhook);

        if !current.status.can_transition_to(status) {
            debug!(
                %external_id,
                current = %current.status,
                incoming = %status,
                "payment_webhook: transition not allowed, acknowledging without changes"
            );
            return Ok(WebhookAck {
                accepted: true,
                external_id,
                status: current.status,
                applied: false,
            });
        }

        let transition = PaymentTransition {
            external_id: external_id.clone(),
            status,
            paid_at: webhook.data.paid_at,
            webhook_data: serde_json::to_value(&webhook.data).unwrap_or_default(),
        };

        let outcome = self
            .payment_repo
            .apply_webhook_transition(transition)
            .await
            .map_err(|err| {
                error!(
                    %external_id,
                    status = %status,
                    db_error = ?err,
                    "payment_webhook: failed to apply transition"
                );
                WebhookError::Internal(err)
            })?;

        match outcome {
            TransitionOutcome::NotFound => {
                warn!(%external_id, "payment_webhook: payment disappeared before transition");
                Err(WebhookError::UnknownPayment(external_id))
            }
            TransitionOutcome::Skipped(payment) => {
                debug!(
                    %external_id,
                    current = %payment.status,
                    incoming = %status,
                    "payment_webhook: concurrent delivery already moved the payment"
                );
                Ok(WebhookAck {
                    accepted: true,
                    external_id,
                    status: payment.status,
                    applied: false,
                })
            }
            TransitionOutcome::Applied { payment, order } => {
                self.status_cache.invalidate(&external_id).await;

                info!(
                    %external_id,
                    gateway_id = %payment.gateway_id,
                    status = %payment.status,
                    order_id = ?order.as_ref().map(|o| o.id),
                    "payment_webhook: payment transition applied"
                );

                match order {
                    None => self.record_missing_order(&payment).await,
                    Some(order) if payment.status == PaymentStatus::Paid => {
                        self.notify_paid(&order).await
                    }
                    Some(_) => {}
                }

                Ok(WebhookAck {
                    accepted: true,
                    external_id,
                    status: payment.status,
                    applied: true,
                })
            }
        }
    }

    async fn record_missing_order(&self, payment: &PaymentRecord) {
        warn!(
            external_id = %payment.external_id,
            gateway_id = %payment.gateway_id,
            status = %payment.status,
            "payment_webhook: payment has no order, flagging for reconstruction"
        );
        let result = self
            .inconsistency_repo
            .record(NewInconsistency {
                external_id: payment.external_id.clone(),
                kind: InconsistencyKind::OrderMissing,
                gateway_id: Some(payment.gateway_id.clone()),
                channel: Some(payment.channel),
                detail: format!("webhook moved payment to {} with no order row", payment.status),
            })
            .await;
        if let Err(err) = result {
            error!(
                external_id = %payment.external_id,
                db_error = ?err,
                "payment_webhook: failed to record missing order"
            );
        }
    }

    async fn notify_paid(&self, order: &OrderRecord) {
        let product_name = match order.product_id {
            Some(product_id) => self
                .product_repo
                .find_name(product_id)
                .await
                .unwrap_or_else(|err| {
                    warn!(%product_id, db_error = ?err, "payment_webhook: product lookup failed");
                    None
                }),
            None => None,
        };

        let notification = OrderPaidNotification {
            order_id: order.id,
            customer_name: order.customer.name.clone(),
            product_name,
            amount: order.amount,
        };

        if let Err(err) = self.notifier.order_paid(notification).await {
            warn!(
                order_id = %order.id,
                error = %err,
                "payment_webhook: order paid notification failed"
            );
        }
    }
}

fn warn_on_amount_mismatch(payment: &PaymentRecord, webhook: &PaymentWebhookPayload) {
    let Some(amount) = webhook.data.amount else {
        return;
    };
    if (amount - payment.amount as f64).abs() >= 1.0 {
        warn!(
            external_id = %payment.external_id,
            stored_amount = payment.amount,
            webhook_amount = amount,
            "payment_webhook: amount differs from stored payment"
        );
    }
}
