pub mod aggregation;
pub mod api;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod db_connect;
pub mod env_loader;
pub mod error;
pub mod filter_options;
pub mod filters;
pub mod models;
pub mod record_store;
pub mod render;
pub mod schema;
