use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::order_statuses::OrderStatus;

/// Local payment status taxonomy. `Paid`, `Expired` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    RequiresAction,
    Paid,
    Expired,
    Failed,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::RequiresAction,
        PaymentStatus::Paid,
        PaymentStatus::Expired,
        PaymentStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::RequiresAction => "REQUIRES_ACTION",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Expired => "EXPIRED",
            PaymentStatus::Failed => "FAILED",
        }
    }

    /// Parses a value previously written by `as_str`.
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(PaymentStatus::Pending),
            "REQUIRES_ACTION" => Some(PaymentStatus::RequiresAction),
            "PAID" => Some(PaymentStatus::Paid),
            "EXPIRED" => Some(PaymentStatus::Expired),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    /// Maps the gateway's status vocabulary onto the local enum.
    ///
    /// Unrecognised values land on `Pending`; nothing unknown is ever read as paid.
    pub fn from_gateway(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "SUCCEEDED" | "PAID" | "SETTLED" | "COMPLETED" => PaymentStatus::Paid,
            "EXPIRED" => PaymentStatus::Expired,
            "FAILED" | "CANCELED" | "CANCELLED" | "VOIDED" => PaymentStatus::Failed,
            "REQUIRES_ACTION" | "AWAITING_CAPTURE" => PaymentStatus::RequiresAction,
            _ => PaymentStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Paid | PaymentStatus::Expired | PaymentStatus::Failed
        )
    }

    fn rank(&self) -> u8 {
        match self {
            PaymentStatus::Pending => 0,
            PaymentStatus::RequiresAction => 1,
            PaymentStatus::Paid | PaymentStatus::Expired | PaymentStatus::Failed => 2,
        }
    }

    /// Only forward moves out of a non-terminal state are allowed.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Returns the status a record ends up in after `incoming` is offered.
    pub fn merge(self, incoming: PaymentStatus) -> PaymentStatus {
        if self.can_transition_to(incoming) {
            incoming
        } else {
            self
        }
    }

    /// Every status from which `self` is a legal next state.
    pub fn predecessors(&self) -> Vec<PaymentStatus> {
        Self::ALL
            .into_iter()
            .filter(|candidate| candidate.can_transition_to(*self))
            .collect()
    }

    pub fn order_status(&self) -> OrderStatus {
        match self {
            PaymentStatus::Pending | PaymentStatus::RequiresAction => OrderStatus::Pending,
            PaymentStatus::Paid => OrderStatus::Paid,
            PaymentStatus::Expired => OrderStatus::Expired,
            PaymentStatus::Failed => OrderStatus::Cancelled,
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_vocabulary_maps_onto_local_statuses() {
        assert_eq!(PaymentStatus::from_gateway("SUCCEEDED"), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_gateway("paid"), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_gateway("EXPIRED"), PaymentStatus::Expired);
        assert_eq!(PaymentStatus::from_gateway("FAILED"), PaymentStatus::Failed);
        assert_eq!(
            PaymentStatus::from_gateway("REQUIRES_ACTION"),
            PaymentStatus::RequiresAction
        );
        assert_eq!(PaymentStatus::from_gateway("PENDING"), PaymentStatus::Pending);
    }

    #[test]
    fn unknown_gateway_status_is_never_paid() {
        for raw in ["", "AUTHORIZED", "paid?", "SUCCEEDED_PARTIALLY", "unknown"] {
            assert_eq!(
                PaymentStatus::from_gateway(raw),
                PaymentStatus::Pending,
                "raw status {raw:?}"
            );
        }
    }

    #[test]
    fn terminal_statuses_absorb_every_delivery() {
        for terminal in [
            PaymentStatus::Paid,
            PaymentStatus::Expired,
            PaymentStatus::Failed,
        ] {
            for incoming in PaymentStatus::ALL {
                assert!(!terminal.can_transition_to(incoming));
                assert_eq!(terminal.merge(incoming), terminal);
            }
        }
    }

    #[test]
    fn only_forward_transitions_are_accepted() {
        use PaymentStatus::*;

        assert!(Pending.can_transition_to(RequiresAction));
        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Expired));
        assert!(Pending.can_transition_to(Failed));
        assert!(RequiresAction.can_transition_to(Paid));
        assert!(!RequiresAction.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!RequiresAction.can_transition_to(RequiresAction));
    }

    #[test]
    fn paid_survives_any_later_delivery_sequence() {
        let deliveries = [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Pending,
            PaymentStatus::Expired,
            PaymentStatus::RequiresAction,
            PaymentStatus::Failed,
            PaymentStatus::Paid,
        ];

        let final_status = deliveries
            .into_iter()
            .fold(PaymentStatus::Pending, PaymentStatus::merge);

        assert_eq!(final_status, PaymentStatus::Paid);
    }

    #[test]
    fn predecessors_list_the_states_that_may_move_forward() {
        assert_eq!(
            PaymentStatus::Paid.predecessors(),
            vec![PaymentStatus::Pending, PaymentStatus::RequiresAction]
        );
        assert_eq!(
            PaymentStatus::RequiresAction.predecessors(),
            vec![PaymentStatus::Pending]
        );
        assert!(PaymentStatus::Pending.predecessors().is_empty());
    }

    #[test]
    fn stored_values_round_trip() {
        for status in PaymentStatus::ALL {
            assert_eq!(PaymentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::from_str("paid"), None);
    }
}
