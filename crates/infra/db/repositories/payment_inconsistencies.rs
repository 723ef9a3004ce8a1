use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad, schema::payment_inconsistencies,
    },
};
use domain::{
    entities::payment_inconsistencies::{InconsistencyEntity, InsertInconsistencyEntity},
    repositories::payment_inconsistencies::InconsistencyRepository,
    value_objects::{
        enums::inconsistency_kinds::InconsistencyKind,
        inconsistencies::{InconsistencyRecord, NewInconsistency},
    },
};

pub struct InconsistencyPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl InconsistencyPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl InconsistencyRepository for InconsistencyPostgres {
    async fn record(&self, inconsistency: NewInconsistency) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let insert_entity = InsertInconsistencyEntity::from(&inconsistency);

        // At most one open row per (external_id, kind), enforced by a partial unique index.
        insert_into(payment_inconsistencies::table)
            .values(&insert_entity)
            .on_conflict_do_nothing()
            .execute(&mut conn)?;

        Ok(())
    }

    async fn resolve_open(
        &self,
        external_id: &str,
        kinds: Vec<InconsistencyKind>,
    ) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let kinds: Vec<String> = kinds.iter().map(ToString::to_string).collect();

        let resolved = update(
            payment_inconsistencies::table
                .filter(payment_inconsistencies::external_id.eq(external_id))
                .filter(payment_inconsistencies::kind.eq_any(kinds))
                .filter(payment_inconsistencies::resolved_at.is_null()),
        )
        .set(payment_inconsistencies::resolved_at.eq(Some(Utc::now())))
        .execute(&mut conn)?;

        Ok(resolved)
    }

    async fn list_open(&self, limit: i64) -> Result<Vec<InconsistencyRecord>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = payment_inconsistencies::table
            .filter(payment_inconsistencies::resolved_at.is_null())
            .order(payment_inconsistencies::created_at.desc())
            .limit(limit)
            .select(InconsistencyEntity::as_select())
            .load::<InconsistencyEntity>(&mut conn)?;

        Ok(results.into_iter().map(InconsistencyRecord::from).collect())
    }
}
