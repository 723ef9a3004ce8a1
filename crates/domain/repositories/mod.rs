pub mod orders;
pub mod payment_inconsistencies;
pub mod payments;
pub mod products;
pub mod status_cache;
