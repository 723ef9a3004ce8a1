use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::repositories::products::ProductRepository,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::products},
};

pub struct ProductPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ProductPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ProductRepository for ProductPostgres {
    async fn find_name(&self, product_id: Uuid) -> Result<Option<String>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let name = products::table
            .filter(products::id.eq(product_id))
            .select(products::name)
            .first::<String>(&mut conn)
            .optional()?;

        Ok(name)
    }
}
