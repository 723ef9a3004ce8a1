pub mod inconsistency_kinds;
pub mod order_statuses;
pub mod order_types;
pub mod payment_channels;
pub mod payment_statuses;
