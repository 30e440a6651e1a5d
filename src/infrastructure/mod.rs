// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod esphome_client;
pub mod event_source;
pub mod logging;
