use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{domain::value_objects::orders::NewOrderRecord, infra::db::postgres::schema::orders};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = orders)]
pub struct OrderEntity {
    pub id: Uuid,
    pub client_external_id: Option<String>,
    pub product_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub order_type: String,
    pub rental_duration: Option<i32>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = orders)]
pub struct InsertOrderEntity {
    pub client_external_id: Option<String>,
    pub product_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub order_type: String,
    pub rental_duration: Option<i32>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&NewOrderRecord> for InsertOrderEntity {
    fn from(value: &NewOrderRecord) -> Self {
        let now = Utc::now();
        Self {
            client_external_id: value.client_external_id.clone(),
            product_id: value.product_id,
            customer_name: value.customer.name.clone(),
            customer_email: value.customer.email.clone(),
            customer_phone: value.customer.phone.clone(),
            order_type: value.order_type.to_string(),
            rental_duration: value.rental_duration,
            amount: value.amount,
            currency: value.currency.clone(),
            status: value.status.to_string(),
            source: value.source.to_string(),
            created_at: now,
            updated_at: now,
            paid_at: value.paid_at,
        }
    }
}
