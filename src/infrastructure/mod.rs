pub mod api_client;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod notifier;
pub mod session_outbox;
pub mod storage;
