use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{Connection, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{orders, payments},
    },
};
use domain::{
    entities::{
        orders::OrderEntity,
        payments::{InsertPaymentEntity, PaymentEntity},
    },
    repositories::payments::PaymentRepository,
    value_objects::{
        channel_data::PaymentData,
        enums::{order_statuses::OrderStatus, payment_statuses::PaymentStatus},
        orders::OrderRecord,
        payments::{NewPaymentRecord, PaymentRecord, PaymentTransition, TransitionOutcome},
    },
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn stored_payment_status(entity: &PaymentEntity) -> Result<PaymentStatus> {
    PaymentStatus::from_str(&entity.status).ok_or_else(|| {
        anyhow!(
            "payment {} has unknown status {:?}",
            entity.external_id,
            entity.status
        )
    })
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn upsert_payment(&self, payment: NewPaymentRecord) -> Result<PaymentRecord> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let insert_entity = InsertPaymentEntity::from(&payment);

        let entity = conn.transaction::<_, anyhow::Error, _>(|conn| {
            insert_into(payments::table)
                .values(&insert_entity)
                .on_conflict(payments::external_id)
                .do_nothing()
                .execute(conn)?;

            let current = payments::table
                .filter(payments::external_id.eq(&payment.external_id))
                .select(PaymentEntity::as_select())
                .for_update()
                .first::<PaymentEntity>(conn)?;

            let status = stored_payment_status(&current)?.merge(payment.status);
            let paid_at = match status {
                PaymentStatus::Paid => current.paid_at.or(payment.paid_at),
                _ => current.paid_at,
            };

            let mut payment_data = payment.payment_data();
            payment_data.last_webhook = PaymentData::from_column(current.payment_data).last_webhook;

            let merged = update(payments::table.filter(payments::id.eq(current.id)))
                .set((
                    payments::gateway_id.eq(&insert_entity.gateway_id),
                    payments::channel.eq(&insert_entity.channel),
                    payments::channel_code.eq(&insert_entity.channel_code),
                    payments::amount.eq(insert_entity.amount),
                    payments::currency.eq(&insert_entity.currency),
                    payments::payment_data.eq(payment_data.to_column()),
                    payments::status.eq(status.to_string()),
                    payments::paid_at.eq(paid_at),
                    payments::updated_at.eq(Utc::now()),
                ))
                .returning(PaymentEntity::as_returning())
                .get_result::<PaymentEntity>(conn)?;

            Ok(merged)
        })?;

        PaymentRecord::try_from(entity)
    }

    async fn get_payment_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentRecord>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let entity = payments::table
            .filter(payments::external_id.eq(external_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        entity.map(PaymentRecord::try_from).transpose()
    }

    async fn apply_webhook_transition(
        &self,
        transition: PaymentTransition,
    ) -> Result<TransitionOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            let Some(current) = payments::table
                .filter(payments::external_id.eq(&transition.external_id))
                .select(PaymentEntity::as_select())
                .for_update()
                .first::<PaymentEntity>(conn)
                .optional()?
            else {
                return Ok(TransitionOutcome::NotFound);
            };

            let current_status = stored_payment_status(&current)?;
            if !current_status.can_transition_to(transition.status) {
                return Ok(TransitionOutcome::Skipped(PaymentRecord::try_from(current)?));
            }

            let now = Utc::now();
            let paid_at = match transition.status {
                PaymentStatus::Paid => transition.paid_at.or(current.paid_at).or(Some(now)),
                _ => current.paid_at,
            };

            let mut payment_data = PaymentData::from_column(current.payment_data.clone());
            payment_data.last_webhook = Some(transition.webhook_data.clone());

            let allowed_from: Vec<String> = transition
                .status
                .predecessors()
                .iter()
                .map(ToString::to_string)
                .collect();

            let Some(payment) = update(
                payments::table
                    .filter(payments::id.eq(current.id))
                    .filter(payments::status.eq_any(allowed_from)),
            )
            .set((
                payments::status.eq(transition.status.to_string()),
                payments::paid_at.eq(paid_at),
                payments::payment_data.eq(payment_data.to_column()),
                payments::updated_at.eq(now),
            ))
            .returning(PaymentEntity::as_returning())
            .get_result::<PaymentEntity>(conn)
            .optional()?
            else {
                return Ok(TransitionOutcome::Skipped(PaymentRecord::try_from(current)?));
            };

            let order = orders::table
                .filter(orders::client_external_id.eq(&transition.external_id))
                .select(OrderEntity::as_select())
                .for_update()
                .first::<OrderEntity>(conn)
                .optional()?;

            let order = match order {
                None => None,
                Some(order) => {
                    let order_status = OrderStatus::from_str(&order.status).ok_or_else(|| {
                        anyhow!("order {} has unknown status {:?}", order.id, order.status)
                    })?;
                    let target = transition.status.order_status();

                    if order_status.can_transition_to(target) {
                        let order_paid_at = match target {
                            OrderStatus::Paid => paid_at,
                            _ => order.paid_at,
                        };
                        let updated = update(orders::table.filter(orders::id.eq(order.id)))
                            .set((
                                orders::status.eq(target.to_string()),
                                orders::paid_at.eq(order_paid_at),
                                orders::updated_at.eq(now),
                            ))
                            .returning(OrderEntity::as_returning())
                            .get_result::<OrderEntity>(conn)?;
                        Some(OrderRecord::try_from(updated)?)
                    } else {
                        Some(OrderRecord::try_from(order)?)
                    }
                }
            };

            Ok(TransitionOutcome::Applied {
                payment: PaymentRecord::try_from(payment)?,
                order,
            })
        })
    }

    async fn find_payments_without_order(
        &self,
        created_before: chrono::DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentRecord>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = payments::table
            .left_join(
                orders::table.on(orders::client_external_id.eq(payments::external_id.nullable())),
            )
            .filter(orders::id.is_null())
            .filter(payments::created_at.lt(created_before))
            .order(payments::created_at.asc())
            .limit(limit)
            .select(PaymentEntity::as_select())
            .load::<PaymentEntity>(&mut conn)?;

        results.into_iter().map(PaymentRecord::try_from).collect()
    }
}
