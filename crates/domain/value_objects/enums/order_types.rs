use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[default]
    Purchase,
    Rental,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Purchase => "purchase",
            OrderType::Rental => "rental",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "purchase" => Some(OrderType::Purchase),
            "rental" => Some(OrderType::Rental),
            _ => None,
        }
    }
}

impl Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an order row came from. Recovered orders hold placeholder customer data.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    #[default]
    Checkout,
    GatewayRecovery,
}

impl OrderSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSource::Checkout => "checkout",
            OrderSource::GatewayRecovery => "gateway_recovery",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "checkout" => Some(OrderSource::Checkout),
            "gateway_recovery" => Some(OrderSource::GatewayRecovery),
            _ => None,
        }
    }
}

impl Display for OrderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
