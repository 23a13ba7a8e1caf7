pub mod api;
pub mod audit_factory;
pub mod auth;
pub mod config;
pub mod error;
pub mod object_store_factory;
pub mod state_factory;
pub mod telemetry;
