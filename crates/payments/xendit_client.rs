use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{Value, json};
use sha2::Sha256;
use thiserror::Error;
use tracing::{error, info};

use crate::domain::value_objects::{
    channel_catalog::ChannelEntry,
    channel_data::ChannelData,
    enums::{order_types::OrderType, payment_channels::PaymentChannel},
    orders::CustomerInfo,
};

type HmacSha256 = Hmac<Sha256>;

const PAYMENT_REQUESTS_PATH: &str = "/payment_requests";
const IDEMPOTENCY_HEADER: &str = "Idempotency-key";
const ONE_TIME_USE: &str = "ONE_TIME_USE";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway rejected the request with status {status}")]
    Rejected { status: u16, body: String },
    #[error("gateway request timed out")]
    Timeout,
    #[error("gateway transport error: {0}")]
    Transport(String),
    /// 2xx without a usable payment id; the payment may exist at the gateway.
    #[error("gateway accepted the request with status {status} but the response is unreadable")]
    UnreadableResponse { status: u16, body: String },
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct XenditSettings {
    pub base_url: String,
    pub secret_key: String,
    pub timeout: Duration,
    pub country: String,
    pub success_return_url: String,
    pub failure_return_url: String,
    pub expiry: chrono::Duration,
}

/// Everything the builder needs to describe one payment attempt.
#[derive(Debug, Clone)]
pub struct PaymentRequestInput {
    pub external_id: String,
    pub amount: i64,
    pub currency: String,
    pub channel: ChannelEntry,
    pub customer: CustomerInfo,
    pub description: Option<String>,
    pub order_type: OrderType,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentRequestBody {
    pub reference_id: String,
    pub amount: i64,
    pub currency: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub payment_method: PaymentMethodBody,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethodBody {
    QrCode {
        reusability: &'static str,
        qr_code: ChannelRequest,
    },
    VirtualAccount {
        reusability: &'static str,
        virtual_account: ChannelRequest,
    },
    Ewallet {
        reusability: &'static str,
        ewallet: ChannelRequest,
    },
    OverTheCounter {
        reusability: &'static str,
        over_the_counter: ChannelRequest,
    },
    Card {
        reusability: &'static str,
        card: ChannelRequest,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChannelRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_code: Option<String>,
    pub channel_properties: ChannelProperties,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ChannelProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_return_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_return_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
}

/// Parsed creation response; `raw` is kept verbatim for the payment record.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPayment {
    pub id: String,
    pub status: String,
    pub channel_data: ChannelData,
    pub raw: Value,
}

/// Builds the channel-specific creation body.
pub fn build_payment_request(
    input: &PaymentRequestInput,
    settings: &XenditSettings,
    now: DateTime<Utc>,
) -> PaymentRequestBody {
    let channel = &input.channel;
    let expires_at = Some(now + settings.expiry);
    let customer_name = Some(input.customer.name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let channel_code = Some(channel.channel_code.clone());

    let payment_method = match channel.channel_type {
        PaymentChannel::Qr => PaymentMethodBody::QrCode {
            reusability: ONE_TIME_USE,
            qr_code: ChannelRequest {
                channel_code,
                channel_properties: ChannelProperties {
                    expires_at,
                    ..Default::default()
                },
            },
        },
        PaymentChannel::VirtualAccount => PaymentMethodBody::VirtualAccount {
            reusability: ONE_TIME_USE,
            virtual_account: ChannelRequest {
                channel_code,
                channel_properties: ChannelProperties {
                    customer_name,
                    expires_at,
                    ..Default::default()
                },
            },
        },
        PaymentChannel::Ewallet => PaymentMethodBody::Ewallet {
            reusability: ONE_TIME_USE,
            ewallet: ChannelRequest {
                channel_code,
                channel_properties: ChannelProperties {
                    success_return_url: Some(settings.success_return_url.clone()),
                    failure_return_url: Some(settings.failure_return_url.clone()),
                    mobile_number: channel
                        .requires_mobile_number
                        .then(|| input.customer.phone.clone())
                        .flatten(),
                    ..Default::default()
                },
            },
        },
        PaymentChannel::OverTheCounter => PaymentMethodBody::OverTheCounter {
            reusability: ONE_TIME_USE,
            over_the_counter: ChannelRequest {
                channel_code,
                channel_properties: ChannelProperties {
                    customer_name,
                    expires_at,
                    ..Default::default()
                },
            },
        },
        PaymentChannel::Card => PaymentMethodBody::Card {
            reusability: ONE_TIME_USE,
            card: ChannelRequest {
                channel_code: None,
                channel_properties: ChannelProperties {
                    success_return_url: Some(settings.success_return_url.clone()),
                    failure_return_url: Some(settings.failure_return_url.clone()),
                    ..Default::default()
                },
            },
        },
    };

    PaymentRequestBody {
        reference_id: input.external_id.clone(),
        amount: input.amount,
        currency: input.currency.clone(),
        country: settings.country.clone(),
        description: input
            .description
            .clone()
            .filter(|_| channel.supports_description),
        payment_method,
        metadata: json!({
            "external_id": input.external_id,
            "order_type": input.order_type.as_str(),
            "method_id": channel.id,
        }),
    }
}

fn str_at<'a>(raw: &'a Value, pointers: &[&str]) -> Option<&'a str> {
    pointers
        .iter()
        .find_map(|pointer| {
            raw.pointer(pointer)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
        })
}

fn time_at(raw: &Value, pointers: &[&str]) -> Option<DateTime<Utc>> {
    str_at(raw, pointers)
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|value| value.with_timezone(&Utc))
}

/// Returns `(web, mobile, deeplink)` action URLs from either the `actions`
/// array of the payment request API or the legacy e-wallet charge object.
fn action_urls(raw: &Value) -> (Option<String>, Option<String>, Option<String>) {
    match raw.get("actions") {
        Some(Value::Array(actions)) => {
            let by_type = |url_type: &str| {
                actions
                    .iter()
                    .find(|action| {
                        action
                            .get("url_type")
                            .and_then(Value::as_str)
                            .is_some_and(|value| value.eq_ignore_ascii_case(url_type))
                    })
                    .and_then(|action| action.get("url").and_then(Value::as_str))
                    .map(str::to_string)
            };
            (by_type("WEB"), by_type("MOBILE"), by_type("DEEPLINK"))
        }
        Some(actions @ Value::Object(_)) => {
            let get = |key: &str| actions.get(key).and_then(Value::as_str).map(str::to_string);
            (
                get("desktop_web_checkout_url"),
                get("mobile_web_checkout_url"),
                get("mobile_deeplink_checkout_url"),
            )
        }
        _ => (None, None, None),
    }
}

/// Extracts presentation data from a creation response. Tolerates both the
/// flat shape (`qr_string` at the top) and the nested `payment_method` shape.
pub fn extract_channel_data(entry: &ChannelEntry, raw: &Value) -> ChannelData {
    match entry.channel_type {
        PaymentChannel::Qr => ChannelData::Qr {
            qr_string: str_at(
                raw,
                &[
                    "/qr_string",
                    "/payment_method/qr_code/channel_properties/qr_string",
                ],
            )
            .unwrap_or_default()
            .to_string(),
        },
        PaymentChannel::VirtualAccount => ChannelData::VirtualAccount {
            bank_code: str_at(
                raw,
                &["/bank_code", "/payment_method/virtual_account/channel_code"],
            )
            .unwrap_or(entry.channel_code.as_str())
            .to_string(),
            account_number: str_at(
                raw,
                &[
                    "/account_number",
                    "/payment_method/virtual_account/channel_properties/virtual_account_number",
                ],
            )
            .unwrap_or_default()
            .to_string(),
            expires_at: time_at(
                raw,
                &[
                    "/expiration_date",
                    "/payment_method/virtual_account/channel_properties/expires_at",
                ],
            ),
        },
        PaymentChannel::Ewallet => {
            let (redirect_url, mobile_url, deeplink_url) = action_urls(raw);
            ChannelData::Ewallet {
                redirect_url,
                mobile_url,
                deeplink_url,
            }
        }
        PaymentChannel::OverTheCounter => ChannelData::OverTheCounter {
            retail_outlet: str_at(
                raw,
                &[
                    "/retail_outlet_name",
                    "/payment_method/over_the_counter/channel_code",
                ],
            )
            .unwrap_or(entry.channel_code.as_str())
            .to_string(),
            payment_code: str_at(
                raw,
                &[
                    "/payment_code",
                    "/payment_method/over_the_counter/channel_properties/payment_code",
                ],
            )
            .unwrap_or_default()
            .to_string(),
            expires_at: time_at(
                raw,
                &[
                    "/expiration_date",
                    "/payment_method/over_the_counter/channel_properties/expires_at",
                ],
            ),
        },
        PaymentChannel::Card => ChannelData::Card {
            redirect_url: action_urls(raw).0,
        },
    }
}

/// Constant-time comparison of a received callback token against the configured one.
pub fn verify_callback_token(expected: &str, provided: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let Ok(mut mac) = HmacSha256::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    let mut expected_mac = mac.clone();
    expected_mac.update(expected.as_bytes());
    let expected_tag = expected_mac.finalize().into_bytes();

    mac.update(provided.as_bytes());
    mac.verify_slice(&expected_tag).is_ok()
}

fn parse_created_payment(text: &str) -> Option<(Value, String)> {
    let raw: Value = serde_json::from_str(text).ok()?;
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())?
        .to_string();
    Some((raw, id))
}

/// Payment Request API client built on reqwest.
pub struct XenditClient {
    http: reqwest::Client,
    settings: XenditSettings,
}

impl XenditClient {
    pub fn new(settings: XenditSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { http, settings })
    }

    pub async fn create_payment_request(
        &self,
        input: &PaymentRequestInput,
    ) -> std::result::Result<GatewayPayment, GatewayError> {
        let body = build_payment_request(input, &self.settings, Utc::now());
        let url = format!(
            "{}{}",
            self.settings.base_url.trim_end_matches('/'),
            PAYMENT_REQUESTS_PATH
        );

        info!(
            external_id = %input.external_id,
            channel_code = %input.channel.channel_code,
            amount = input.amount,
            "xendit: creating payment request"
        );

        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.settings.secret_key, None::<&str>)
            .header(IDEMPOTENCY_HEADER, &input.external_id)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.text().await {
                Ok(text) if !text.is_empty() => text,
                Ok(_) => "<empty response body>".to_string(),
                Err(err) => format!("<failed to read response body: {err}>"),
            };
            error!(
                external_id = %input.external_id,
                status = %status,
                response_body = %body,
                "xendit: payment request rejected"
            );
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        let Some((raw, id)) = parse_created_payment(&text) else {
            error!(
                external_id = %input.external_id,
                status = %status,
                response_body = %text,
                "xendit: payment request accepted but response has no payment id"
            );
            return Err(GatewayError::UnreadableResponse {
                status: status.as_u16(),
                body: text,
            });
        };
        let gateway_status = raw
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("PENDING")
            .to_string();

        Ok(GatewayPayment {
            id,
            status: gateway_status,
            channel_data: extract_channel_data(&input.channel, &raw),
            raw,
        })
    }
}
