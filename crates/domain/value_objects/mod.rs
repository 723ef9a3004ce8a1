pub mod channel_catalog;
pub mod channel_data;
pub mod enums;
pub mod inconsistencies;
pub mod orders;
pub mod payment_webhook;
pub mod payments;
