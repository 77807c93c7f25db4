//! Switchyard Core Library
//!
//! This library provides core functionality for the Switchyard gateway including:
//! - Configuration management
//! - Discovery client abstraction
//! - Shared error types

pub mod config;
pub mod discovery;
pub mod error;

// Re-export commonly used types
pub use config::model::{
    Config, DiscoverySettings, LoadBalanceSettings, LoadBalanceStrategy, ProxySettings,
    RouteConfig, ServerSettings,
};
pub use discovery::{DiscoveryClient, DiscoveryEvent, ServiceInstance, StaticDiscoveryClient};
pub use error::GatewayError;
