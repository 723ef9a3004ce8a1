use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::{inconsistency_kinds::InconsistencyKind, payment_channels::PaymentChannel};

#[derive(Debug, Clone, PartialEq)]
pub struct NewInconsistency {
    pub external_id: String,
    pub kind: InconsistencyKind,
    pub gateway_id: Option<String>,
    pub channel: Option<PaymentChannel>,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InconsistencyRecord {
    pub id: Uuid,
    pub external_id: String,
    pub kind: String,
    pub gateway_id: Option<String>,
    pub channel: Option<String>,
    pub detail: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}
