pub mod xendit_client;
