use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::inconsistencies::{InconsistencyRecord, NewInconsistency},
    infra::db::postgres::schema::payment_inconsistencies,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_inconsistencies)]
pub struct InconsistencyEntity {
    pub id: Uuid,
    pub external_id: String,
    pub kind: String,
    pub gateway_id: Option<String>,
    pub channel: Option<String>,
    pub detail: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_inconsistencies)]
pub struct InsertInconsistencyEntity {
    pub external_id: String,
    pub kind: String,
    pub gateway_id: Option<String>,
    pub channel: Option<String>,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

impl From<&NewInconsistency> for InsertInconsistencyEntity {
    fn from(value: &NewInconsistency) -> Self {
        Self {
            external_id: value.external_id.clone(),
            kind: value.kind.to_string(),
            gateway_id: value.gateway_id.clone(),
            channel: value.channel.map(|channel| channel.to_string()),
            detail: value.detail.clone(),
            created_at: Utc::now(),
        }
    }
}

impl From<InconsistencyEntity> for InconsistencyRecord {
    fn from(value: InconsistencyEntity) -> Self {
        Self {
            id: value.id,
            external_id: value.external_id,
            kind: value.kind,
            gateway_id: value.gateway_id,
            channel: value.channel,
            detail: value.detail,
            created_at: value.created_at,
            resolved_at: value.resolved_at,
        }
    }
}
