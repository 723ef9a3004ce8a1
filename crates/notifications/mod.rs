pub mod order_notifier;
