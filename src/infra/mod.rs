//! Infrastructure adapters and runtime bootstrap.

pub mod admin_client;
pub mod db;
pub mod error;
pub mod http;
pub mod telemetry;
