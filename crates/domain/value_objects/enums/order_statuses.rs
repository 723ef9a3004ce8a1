use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
        }
    }

    /// Parses a stored order status.
    ///
    /// Legacy rows written by the reporting scripts use `completed`; it is read as
    /// `Paid` but never written.
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "paid" | "completed" => Some(OrderStatus::Paid),
            "cancelled" | "canceled" => Some(OrderStatus::Cancelled),
            "expired" => Some(OrderStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    /// `pending -> {paid | cancelled | expired}`; nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        *self == OrderStatus::Pending && next != OrderStatus::Pending
    }

    pub fn merge(self, incoming: OrderStatus) -> OrderStatus {
        if self.can_transition_to(incoming) {
            incoming
        } else {
            self
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
