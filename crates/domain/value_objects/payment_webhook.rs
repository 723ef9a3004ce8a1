use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Gateway notification body: `{event, data: {...}}`.
///
/// Fields are read leniently: a value of the wrong shape becomes `None` instead of
/// failing the whole callback.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentWebhookPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub event: Option<String>,
    #[serde(default)]
    pub data: PaymentWebhookData,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PaymentWebhookData {
    /// Gateway-side id.
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub external_id: Option<String>,
    /// Payment Request API name for the external id.
    #[serde(default, deserialize_with = "lenient_string")]
    pub reference_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(value) => Some(value),
        Value::Number(value) => Some(value.to_string()),
        other => {
            warn!(value = %other, "payment webhook: ignoring non-string field");
            None
        }
    })
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let amount = match &value {
        Value::Null => return Ok(None),
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    if amount.is_none() {
        warn!(value = %value, "payment webhook: ignoring unreadable amount");
    }
    Ok(amount.filter(|amount| amount.is_finite()))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Null => return Ok(None),
        Value::String(text) => parse_timestamp(text.trim()),
        Value::Number(number) => number
            .as_i64()
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0)),
        _ => None,
    };
    if parsed.is_none() {
        warn!(value = %value, "payment webhook: ignoring unreadable timestamp");
    }
    Ok(parsed)
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

impl PaymentWebhookPayload {
    pub fn external_id(&self) -> Option<&str> {
        self.data
            .external_id
            .as_deref()
            .or(self.data.reference_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// `data.status`, or the event name suffix (`payment.succeeded` -> `SUCCEEDED`).
    pub fn gateway_status(&self) -> Option<String> {
        if let Some(status) = self.data.status.as_deref().filter(|s| !s.trim().is_empty()) {
            return Some(status.trim().to_ascii_uppercase());
        }

        self.event
            .as_deref()
            .and_then(|event| event.rsplit('.').next())
            .filter(|suffix| !suffix.is_empty())
            .map(|suffix| suffix.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_id_is_used_when_external_id_is_absent() {
        let payload: PaymentWebhookPayload = serde_json::from_str(
            r#"{"event": "payment.succeeded", "data": {"id": "pr_1", "reference_id": "order_1_abc", "status": "SUCCEEDED"}}"#,
        )
        .unwrap();

        assert_eq!(payload.external_id(), Some("order_1_abc"));
        assert_eq!(payload.gateway_status().as_deref(), Some("SUCCEEDED"));
    }

    #[test]
    fn status_falls_back_to_event_suffix() {
        let payload: PaymentWebhookPayload = serde_json::from_str(
            r#"{"event": "payment.expired", "data": {"external_id": "order_1_abc"}}"#,
        )
        .unwrap();

        assert_eq!(payload.gateway_status().as_deref(), Some("EXPIRED"));
    }

    #[test]
    fn paid_at_parses_rfc3339() {
        let payload: PaymentWebhookPayload = serde_json::from_str(
            r#"{"data": {"external_id": "order_1_abc", "status": "paid", "paid_at": "2024-01-01T00:00:00Z", "amount": 150000}}"#,
        )
        .unwrap();

        assert_eq!(
            payload.data.paid_at.unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
        assert_eq!(payload.data.amount, Some(150_000.0));
        assert_eq!(payload.gateway_status().as_deref(), Some("PAID"));
    }

    #[test]
    fn loosely_typed_fields_do_not_reject_the_callback() {
        let payload: PaymentWebhookPayload = serde_json::from_str(
            r#"{"event": "payment.succeeded", "data": {"id": "pr_1", "external_id": "order_1_abc", "status": "SUCCEEDED", "amount": "150000", "paid_at": "2024-01-01 00:00:00"}}"#,
        )
        .unwrap();

        assert_eq!(payload.external_id(), Some("order_1_abc"));
        assert_eq!(payload.gateway_status().as_deref(), Some("SUCCEEDED"));
        assert_eq!(payload.data.amount, Some(150_000.0));
        assert_eq!(
            payload.data.paid_at.unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn unreadable_optional_fields_become_none() {
        let payload: PaymentWebhookPayload = serde_json::from_str(
            r#"{"data": {"external_id": "order_1_abc", "status": "PAID", "amount": {"value": 1}, "paid_at": "yesterday", "currency": ["IDR"]}}"#,
        )
        .unwrap();

        assert_eq!(payload.external_id(), Some("order_1_abc"));
        assert_eq!(payload.data.amount, None);
        assert_eq!(payload.data.paid_at, None);
        assert_eq!(payload.data.currency, None);
    }

    #[test]
    fn unix_seconds_paid_at_is_accepted() {
        let payload: PaymentWebhookPayload = serde_json::from_str(
            r#"{"data": {"external_id": "order_1_abc", "status": "PAID", "paid_at": 1704067200}}"#,
        )
        .unwrap();

        assert_eq!(
            payload.data.paid_at.unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn blank_external_id_is_treated_as_missing() {
        let payload: PaymentWebhookPayload =
            serde_json::from_str(r#"{"data": {"external_id": "  ", "status": "PAID"}}"#).unwrap();

        assert_eq!(payload.external_id(), None);
    }
}
