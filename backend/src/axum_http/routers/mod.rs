pub mod orders;
pub mod payment_webhook;
pub mod payments;
