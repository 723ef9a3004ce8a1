use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::value_objects::payments::NewPaymentRecord,
    infra::db::postgres::schema::payments,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub external_id: String,
    pub gateway_id: String,
    pub channel: String,        // QR, VIRTUAL_ACCOUNT, EWALLET, OVER_THE_COUNTER, CARD
    pub channel_code: String,   // catalog code, example: BCA, QRIS, OVO
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub payment_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub external_id: String,
    pub gateway_id: String,
    pub channel: String,
    pub channel_code: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub payment_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&NewPaymentRecord> for InsertPaymentEntity {
    fn from(value: &NewPaymentRecord) -> Self {
        let now = Utc::now();
        Self {
            external_id: value.external_id.clone(),
            gateway_id: value.gateway_id.clone(),
            channel: value.channel.to_string(),
            channel_code: value.channel_code.clone(),
            status: value.status.to_string(),
            amount: value.amount,
            currency: value.currency.clone(),
            payment_data: value.payment_data().to_column(),
            created_at: now,
            updated_at: now,
            paid_at: value.paid_at,
        }
    }
}
