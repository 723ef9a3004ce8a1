use std::sync::Arc;

use chrono::{Duration, Utc};
use crates::domain::{
    repositories::{
        orders::OrderRepository, payment_inconsistencies::InconsistencyRepository,
        payments::PaymentRepository,
    },
    value_objects::{
        enums::{
            inconsistency_kinds::InconsistencyKind,
            order_types::{OrderSource, OrderType},
        },
        inconsistencies::{InconsistencyRecord, NewInconsistency},
        orders::{CustomerInfo, NewOrderRecord, OrderRecord},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("no payment for external id {0}")]
    PaymentNotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedOrder {
    pub order: OrderRecord,
    /// False when an order already existed and was returned as-is.
    pub created: bool,
    pub resolved_inconsistencies: usize,
}

/// Operator tooling for payments that exist without an order.
pub struct OrderRecoveryUseCase<P, O, I>
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    I: InconsistencyRepository + Send + Sync + 'static,
{
    payment_repo: Arc<P>,
    order_repo: Arc<O>,
    inconsistency_repo: Arc<I>,
}

impl<P, O, I> OrderRecoveryUseCase<P, O, I>
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    I: InconsistencyRepository + Send + Sync + 'static,
{
    pub fn new(payment_repo: Arc<P>, order_repo: Arc<O>, inconsistency_repo: Arc<I>) -> Self {
        Self {
            payment_repo,
            order_repo,
            inconsistency_repo,
        }
    }

    /// Builds an order from the stored payment. Safe to run more than once.
    pub async fn reconstruct_order(
        &self,
        external_id: &str,
    ) -> Result<ReconstructedOrder, RecoveryError> {
        let payment = self
            .payment_repo
            .get_payment_by_external_id(external_id)
            .await
            .map_err(|err| {
                error!(%external_id, db_error = ?err, "order_recovery: failed to load payment");
                RecoveryError::Internal(err)
            })?
            .ok_or_else(|| RecoveryError::PaymentNotFound(external_id.to_string()))?;

        let (order, created) = match self
            .order_repo
            .get_order_by_external_id(external_id)
            .await
            .map_err(|err| {
                error!(%external_id, db_error = ?err, "order_recovery: failed to load order");
                RecoveryError::Internal(err)
            })? {
            Some(order) => (order, false),
            None => {
                let new_order = NewOrderRecord {
                    client_external_id: Some(payment.external_id.clone()),
                    product_id: None,
                    customer: CustomerInfo::recovered(),
                    order_type: OrderType::Purchase,
                    rental_duration: None,
                    amount: payment.amount,
                    currency: payment.currency.clone(),
                    status: payment.status.order_status(),
                    source: OrderSource::GatewayRecovery,
                    paid_at: payment.paid_at,
                };
                self.order_repo
                    .insert_order_if_absent(new_order)
                    .await
                    .map_err(|err| {
                        error!(
                            %external_id,
                            db_error = ?err,
                            "order_recovery: failed to insert reconstructed order"
                        );
                        RecoveryError::Internal(err)
                    })?
            }
        };

        let resolved_inconsistencies = self
            .inconsistency_repo
            .resolve_open(
                external_id,
                InconsistencyKind::repaired_by_order_reconstruction().to_vec(),
            )
            .await
            .map_err(|err| {
                error!(
                    %external_id,
                    db_error = ?err,
                    "order_recovery: failed to resolve inconsistencies"
                );
                RecoveryError::Internal(err)
            })?;

        info!(
            %external_id,
            order_id = %order.id,
            created,
            status = %order.status,
            resolved_inconsistencies,
            "order_recovery: order reconstructed"
        );

        Ok(ReconstructedOrder {
            order,
            created,
            resolved_inconsistencies,
        })
    }

    /// Flags payments older than `grace` that still have no order. Returns their external ids.
    pub async fn sweep_orphans(
        &self,
        grace: Duration,
        limit: i64,
    ) -> Result<Vec<String>, RecoveryError> {
        let created_before = Utc::now() - grace;
        let orphans = self
            .payment_repo
            .find_payments_without_order(created_before, limit)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "order_recovery: failed to list orphaned payments");
                RecoveryError::Internal(err)
            })?;

        let mut flagged = Vec::with_capacity(orphans.len());
        for payment in orphans {
            warn!(
                external_id = %payment.external_id,
                gateway_id = %payment.gateway_id,
                status = %payment.status,
                created_at = %payment.created_at,
                "order_recovery: payment has no order"
            );
            self.inconsistency_repo
                .record(NewInconsistency {
                    external_id: payment.external_id.clone(),
                    kind: InconsistencyKind::OrphanedPayment,
                    gateway_id: Some(payment.gateway_id.clone()),
                    channel: Some(payment.channel),
                    detail: format!(
                        "payment {} created at {} has no order",
                        payment.status,
                        payment.created_at.to_rfc3339()
                    ),
                })
                .await
                .map_err(|err| {
                    error!(
                        external_id = %payment.external_id,
                        db_error = ?err,
                        "order_recovery: failed to record orphaned payment"
                    );
                    RecoveryError::Internal(err)
                })?;
            flagged.push(payment.external_id);
        }

        info!(count = flagged.len(), "order_recovery: orphan sweep finished");
        Ok(flagged)
    }

    pub async fn list_open_inconsistencies(
        &self,
        limit: i64,
    ) -> Result<Vec<InconsistencyRecord>, RecoveryError> {
        self.inconsistency_repo.list_open(limit).await.map_err(|err| {
            error!(db_error = ?err, "order_recovery: failed to list inconsistencies");
            RecoveryError::Internal(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::{
        repositories::{
            orders::MockOrderRepository, payment_inconsistencies::MockInconsistencyRepository,
            payments::MockPaymentRepository,
        },
        value_objects::{
            enums::{
                order_statuses::OrderStatus, payment_channels::PaymentChannel,
                payment_statuses::PaymentStatus,
            },
            orders::RECOVERED_CUSTOMER_NAME,
            payments::PaymentRecord,
        },
    };
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn paid_payment(external_id: &str) -> PaymentRecord {
        let now = Utc::now();
        PaymentRecord {
            id: Uuid::new_v4(),
            external_id: external_id.to_string(),
            gateway_id: "pr_9".to_string(),
            channel: PaymentChannel::Ewallet,
            channel_code: "DANA".to_string(),
            status: PaymentStatus::Paid,
            amount: 75_000,
            currency: "IDR".to_string(),
            channel_data: None,
            gateway_response: json!({}),
            created_at: now - Duration::hours(2),
            updated_at: now,
            paid_at: Some(now),
        }
    }

    fn order_from(new: NewOrderRecord) -> OrderRecord {
        let now = Utc::now();
        OrderRecord {
            id: Uuid::new_v4(),
            client_external_id: new.client_external_id,
            product_id: new.product_id,
            customer: new.customer,
            order_type: new.order_type,
            rental_duration: new.rental_duration,
            amount: new.amount,
            currency: new.currency,
            status: new.status,
            source: new.source,
            created_at: now,
            updated_at: now,
            paid_at: new.paid_at,
        }
    }

    #[tokio::test]
    async fn reconstructs_paid_order_with_placeholder_customer() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|id| Ok(Some(paid_payment(id))));
        let mut order_repo = MockOrderRepository::new();
        order_repo
            .expect_get_order_by_external_id()
            .returning(|_| Ok(None));
        order_repo
            .expect_insert_order_if_absent()
            .withf(|order| {
                order.customer.name == RECOVERED_CUSTOMER_NAME
                    && order.status == OrderStatus::Paid
                    && order.source == OrderSource::GatewayRecovery
                    && order.amount == 75_000
                    && order.paid_at.is_some()
            })
            .times(1)
            .returning(|order| Ok((order_from(order), true)));
        let mut inconsistency_repo = MockInconsistencyRepository::new();
        inconsistency_repo
            .expect_resolve_open()
            .withf(|id, kinds| {
                id == "order_7_abcdef" && kinds.contains(&InconsistencyKind::OrderMissing)
            })
            .times(1)
            .returning(|_, _| Ok(1));

        let usecase = OrderRecoveryUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_repo),
            Arc::new(inconsistency_repo),
        );

        let result = usecase.reconstruct_order("order_7_abcdef").await.unwrap();

        assert!(result.created);
        assert!(result.order.is_recovered());
        assert_eq!(result.resolved_inconsistencies, 1);
        assert_eq!(
            result.order.client_external_id.as_deref(),
            Some("order_7_abcdef")
        );
    }

    #[tokio::test]
    async fn existing_order_is_returned_without_insert() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|id| Ok(Some(paid_payment(id))));
        let mut order_repo = MockOrderRepository::new();
        order_repo.expect_get_order_by_external_id().returning(|id| {
            Ok(Some(order_from(NewOrderRecord {
                client_external_id: Some(id.to_string()),
                product_id: None,
                customer: CustomerInfo::recovered(),
                order_type: OrderType::Purchase,
                rental_duration: None,
                amount: 75_000,
                currency: "IDR".to_string(),
                status: OrderStatus::Paid,
                source: OrderSource::GatewayRecovery,
                paid_at: None,
            })))
        });
        order_repo.expect_insert_order_if_absent().times(0);
        let mut inconsistency_repo = MockInconsistencyRepository::new();
        inconsistency_repo
            .expect_resolve_open()
            .returning(|_, _| Ok(0));

        let usecase = OrderRecoveryUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_repo),
            Arc::new(inconsistency_repo),
        );

        let result = usecase.reconstruct_order("order_7_abcdef").await.unwrap();

        assert!(!result.created);
        assert_eq!(result.resolved_inconsistencies, 0);
    }

    #[tokio::test]
    async fn reconstructing_twice_leaves_one_order() {
        let stored: Arc<Mutex<Option<OrderRecord>>> = Arc::new(Mutex::new(None));
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|id| Ok(Some(paid_payment(id))));
        let mut order_repo = MockOrderRepository::new();
        let reader = Arc::clone(&stored);
        order_repo
            .expect_get_order_by_external_id()
            .times(2)
            .returning(move |_| Ok(reader.lock().unwrap().clone()));
        let writer = Arc::clone(&stored);
        order_repo
            .expect_insert_order_if_absent()
            .times(1)
            .returning(move |new| {
                let mut slot = writer.lock().unwrap();
                match slot.as_ref() {
                    Some(existing) => Ok((existing.clone(), false)),
                    None => {
                        let order = order_from(new);
                        *slot = Some(order.clone());
                        Ok((order, true))
                    }
                }
            });
        let mut inconsistency_repo = MockInconsistencyRepository::new();
        let mut open = 1;
        inconsistency_repo
            .expect_resolve_open()
            .times(2)
            .returning(move |_, _| Ok(std::mem::take(&mut open)));

        let usecase = OrderRecoveryUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_repo),
            Arc::new(inconsistency_repo),
        );

        let first = usecase.reconstruct_order("order_7_abcdef").await.unwrap();
        let second = usecase.reconstruct_order("order_7_abcdef").await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.order.id, second.order.id);
        assert_eq!(first.resolved_inconsistencies, 1);
        assert_eq!(second.resolved_inconsistencies, 0);
    }

    #[tokio::test]
    async fn missing_payment_cannot_be_reconstructed() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|_| Ok(None));
        let mut order_repo = MockOrderRepository::new();
        order_repo.expect_insert_order_if_absent().times(0);

        let usecase = OrderRecoveryUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_repo),
            Arc::new(MockInconsistencyRepository::new()),
        );

        let err = usecase.reconstruct_order("order_8_abcdef").await.unwrap_err();

        assert!(matches!(err, RecoveryError::PaymentNotFound(id) if id == "order_8_abcdef"));
    }

    #[tokio::test]
    async fn sweep_flags_every_orphan() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_find_payments_without_order()
            .withf(|created_before, limit| *created_before < Utc::now() && *limit == 50)
            .times(1)
            .returning(|_, _| Ok(vec![paid_payment("order_1_aaaaaa"), paid_payment("order_2_bbbbbb")]));
        let mut inconsistency_repo = MockInconsistencyRepository::new();
        inconsistency_repo
            .expect_record()
            .withf(|entry| entry.kind == InconsistencyKind::OrphanedPayment)
            .times(2)
            .returning(|_| Ok(()));

        let usecase = OrderRecoveryUseCase::new(
            Arc::new(payment_repo),
            Arc::new(MockOrderRepository::new()),
            Arc::new(inconsistency_repo),
        );

        let flagged = usecase
            .sweep_orphans(Duration::minutes(30), 50)
            .await
            .unwrap();

        assert_eq!(flagged, vec!["order_1_aaaaaa", "order_2_bbbbbb"]);
    }
}
