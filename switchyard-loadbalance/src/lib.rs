//! Switchyard Load Balance Library
//!
//! This library provides load balancing functionality for the Switchyard gateway including:
//! - Zone-aware server lists backed by service discovery
//! - Round-robin and weighted-random server selection
//! - Per-server request statistics
//! - Lazy per-service load balancer registry with background refresh

pub mod loadbalance;

// Re-export commonly used types
pub use loadbalance::{
    approximate_zone, ConfiguredServerList, DiscoveryServerList, LoadBalanceService, LoadBalancer,
    LoadBalancerClient, LoadBalancerStats, Server, ServerList, ServerStats,
};
