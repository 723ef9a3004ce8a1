use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Gateway/local divergences that recovery tooling has to look at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// Gateway created the payment, the local payment row was not written.
    PaymentWriteFailed,
    /// Payment row exists, the order write after it failed.
    OrderWriteFailed,
    /// A webhook transitioned a payment whose order row does not exist.
    OrderMissing,
    /// Sweep found a payment older than the grace period with no order.
    OrphanedPayment,
    /// Gateway answered 2xx without a payment id; it may hold a payment we never stored.
    UnreadableGatewayResponse,
}

impl InconsistencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InconsistencyKind::PaymentWriteFailed => "payment_write_failed",
            InconsistencyKind::OrderWriteFailed => "order_write_failed",
            InconsistencyKind::OrderMissing => "order_missing",
            InconsistencyKind::OrphanedPayment => "orphaned_payment",
            InconsistencyKind::UnreadableGatewayResponse => "unreadable_gateway_response",
        }
    }

    /// Kinds that `reconstruct_order` repairs.
    pub fn repaired_by_order_reconstruction() -> [InconsistencyKind; 3] {
        [
            InconsistencyKind::OrderWriteFailed,
            InconsistencyKind::OrderMissing,
            InconsistencyKind::OrphanedPayment,
        ]
    }
}

impl Display for InconsistencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
