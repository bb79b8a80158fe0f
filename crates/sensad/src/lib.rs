//! Sensa daemon library - exposes modules for testing.

pub mod capabilities;
pub mod config;
pub mod health;
pub mod middleware;
pub mod model;
pub mod ollama;
pub mod payment;
pub mod router;
pub mod routes;
pub mod server;
pub mod signer;
pub mod store;
