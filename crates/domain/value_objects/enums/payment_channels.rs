use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Channel type of a payment rail. Decides the request and response shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentChannel {
    Qr,
    VirtualAccount,
    Ewallet,
    OverTheCounter,
    Card,
}

impl PaymentChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentChannel::Qr => "QR",
            PaymentChannel::VirtualAccount => "VIRTUAL_ACCOUNT",
            PaymentChannel::Ewallet => "EWALLET",
            PaymentChannel::OverTheCounter => "OVER_THE_COUNTER",
            PaymentChannel::Card => "CARD",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "QR" => Some(PaymentChannel::Qr),
            "VIRTUAL_ACCOUNT" => Some(PaymentChannel::VirtualAccount),
            "EWALLET" => Some(PaymentChannel::Ewallet),
            "OVER_THE_COUNTER" => Some(PaymentChannel::OverTheCounter),
            "CARD" => Some(PaymentChannel::Card),
            _ => None,
        }
    }

    /// Channels where the customer must leave the storefront (redirect/deeplink)
    /// start in `REQUIRES_ACTION` rather than `PENDING`.
    pub fn requires_customer_action(&self) -> bool {
        matches!(self, PaymentChannel::Ewallet | PaymentChannel::Card)
    }
}

impl Display for PaymentChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
