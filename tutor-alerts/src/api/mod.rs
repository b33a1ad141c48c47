//! REST API server module.
//!
//! HTTP endpoints over the notification gateway, the push WebSocket and
//! operational routes.

pub mod error;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
