//! HTTP request handlers, organized by resource.

pub mod cargo;
pub mod health;
pub mod trucks;
pub mod websocket;

pub use health::{health_check, readiness};
