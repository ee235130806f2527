pub mod auth_client;
pub mod config;
pub mod error;
pub mod preferences;
pub mod record_mapper;
pub mod row_store_client;
pub mod session_store;
pub mod storage;
