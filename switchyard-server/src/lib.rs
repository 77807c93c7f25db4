//! Switchyard Server Library
//!
//! This library provides the HTTP frontend for the Switchyard gateway including:
//! - Application state wiring and lifecycle
//! - Catch-all proxy endpoint backed by the filter pipeline
//! - Admin endpoints for route table and server statistics

pub mod app;
pub mod router;

pub use app::{create_app, start_server, AppState};
