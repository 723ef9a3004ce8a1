use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{Connection, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::orders},
};
use domain::{
    entities::orders::{InsertOrderEntity, OrderEntity},
    repositories::orders::OrderRepository,
    value_objects::{
        enums::order_statuses::OrderStatus,
        orders::{NewOrderRecord, OrderRecord},
    },
};

pub struct OrderPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl OrderPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OrderRepository for OrderPostgres {
    async fn upsert_order(&self, order: NewOrderRecord) -> Result<OrderRecord> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let insert_entity = InsertOrderEntity::from(&order);

        let Some(external_id) = order.client_external_id.as_deref() else {
            let entity = insert_into(orders::table)
                .values(&insert_entity)
                .returning(OrderEntity::as_returning())
                .get_result::<OrderEntity>(&mut conn)?;
            return OrderRecord::try_from(entity);
        };

        let entity = conn.transaction::<_, anyhow::Error, _>(|conn| {
            insert_into(orders::table)
                .values(&insert_entity)
                .on_conflict(orders::client_external_id)
                .do_nothing()
                .execute(conn)?;

            let current = orders::table
                .filter(orders::client_external_id.eq(external_id))
                .select(OrderEntity::as_select())
                .for_update()
                .first::<OrderEntity>(conn)?;

            let current_status = OrderStatus::from_str(&current.status).ok_or_else(|| {
                anyhow!("order {} has unknown status {:?}", current.id, current.status)
            })?;
            let status = current_status.merge(order.status);
            let paid_at = match status {
                OrderStatus::Paid => current.paid_at.or(order.paid_at),
                _ => current.paid_at,
            };

            let merged = update(orders::table.filter(orders::id.eq(current.id)))
                .set((
                    orders::product_id.eq(insert_entity.product_id),
                    orders::customer_name.eq(&insert_entity.customer_name),
                    orders::customer_email.eq(&insert_entity.customer_email),
                    orders::customer_phone.eq(&insert_entity.customer_phone),
                    orders::order_type.eq(&insert_entity.order_type),
                    orders::rental_duration.eq(insert_entity.rental_duration),
                    orders::amount.eq(insert_entity.amount),
                    orders::currency.eq(&insert_entity.currency),
                    orders::source.eq(&insert_entity.source),
                    orders::status.eq(status.to_string()),
                    orders::paid_at.eq(paid_at),
                    orders::updated_at.eq(Utc::now()),
                ))
                .returning(OrderEntity::as_returning())
                .get_result::<OrderEntity>(conn)?;

            Ok(merged)
        })?;

        OrderRecord::try_from(entity)
    }

    async fn get_order_by_external_id(&self, external_id: &str) -> Result<Option<OrderRecord>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let entity = orders::table
            .filter(orders::client_external_id.eq(external_id))
            .select(OrderEntity::as_select())
            .first::<OrderEntity>(&mut conn)
            .optional()?;

        entity.map(OrderRecord::try_from).transpose()
    }

    async fn insert_order_if_absent(&self, order: NewOrderRecord) -> Result<(OrderRecord, bool)> {
        let external_id = order
            .client_external_id
            .clone()
            .ok_or_else(|| anyhow!("insert_order_if_absent requires a client external id"))?;
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let insert_entity = InsertOrderEntity::from(&order);

        let (entity, created) = conn.transaction::<_, anyhow::Error, _>(|conn| {
            let inserted = insert_into(orders::table)
                .values(&insert_entity)
                .on_conflict(orders::client_external_id)
                .do_nothing()
                .returning(OrderEntity::as_returning())
                .get_result::<OrderEntity>(conn)
                .optional()?;

            if let Some(inserted) = inserted {
                return Ok((inserted, true));
            }

            let existing = orders::table
                .filter(orders::client_external_id.eq(&external_id))
                .select(OrderEntity::as_select())
                .first::<OrderEntity>(conn)?;

            Ok((existing, false))
        })?;

        Ok((OrderRecord::try_from(entity)?, created))
    }
}
