pub mod alert_queue;
pub mod api;
pub mod cloud_client;
pub mod commands;
pub mod config;
pub mod context;
pub mod error_stats;
pub mod reporter;
pub mod settings;
