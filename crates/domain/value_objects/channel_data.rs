use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the customer needs to complete a payment, per channel type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ChannelData {
    #[serde(rename = "QR")]
    Qr { qr_string: String },
    #[serde(rename = "VA")]
    VirtualAccount {
        bank_code: String,
        account_number: String,
        expires_at: Option<DateTime<Utc>>,
    },
    #[serde(rename = "EWALLET")]
    Ewallet {
        redirect_url: Option<String>,
        mobile_url: Option<String>,
        deeplink_url: Option<String>,
    },
    #[serde(rename = "OTC")]
    OverTheCounter {
        retail_outlet: String,
        payment_code: String,
        expires_at: Option<DateTime<Utc>>,
    },
    #[serde(rename = "CARD")]
    Card { redirect_url: Option<String> },
}

impl ChannelData {
    /// URL the storefront should send the customer to, if any.
    pub fn action_url(&self) -> Option<&str> {
        match self {
            ChannelData::Ewallet {
                redirect_url,
                mobile_url,
                deeplink_url,
            } => redirect_url
                .as_deref()
                .or(mobile_url.as_deref())
                .or(deeplink_url.as_deref()),
            ChannelData::Card { redirect_url } => redirect_url.as_deref(),
            _ => None,
        }
    }
}

/// Shape of the `payments.payment_data` jsonb column.
///
/// The gateway response is kept verbatim for replay and support; `presentation`
/// is the typed view extracted from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentData {
    pub presentation: Option<ChannelData>,
    #[serde(default)]
    pub gateway_response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_webhook: Option<Value>,
}

impl PaymentData {
    pub fn new(presentation: ChannelData, gateway_response: Value) -> Self {
        Self {
            presentation: Some(presentation),
            gateway_response,
            last_webhook: None,
        }
    }

    /// Reads the column, treating rows in any other shape as an opaque gateway response.
    pub fn from_column(raw: Value) -> Self {
        let wrapped = raw.get("gateway_response").is_some();
        match wrapped
            .then(|| serde_json::from_value::<PaymentData>(raw.clone()).ok())
            .flatten()
        {
            Some(data) => data,
            None => Self {
                presentation: None,
                gateway_response: raw,
                last_webhook: None,
            },
        }
    }

    pub fn to_column(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
