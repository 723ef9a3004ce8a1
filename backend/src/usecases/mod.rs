pub mod order_recovery;
pub mod order_status;
pub mod payment_webhook;
pub mod payments;
