pub mod balancer;
pub mod client;
pub mod server;
pub mod server_list;
pub mod service;
pub mod stats;

pub use balancer::LoadBalancer;
pub use client::LoadBalancerClient;
pub use server::Server;
pub use server_list::{approximate_zone, ConfiguredServerList, DiscoveryServerList, ServerList};
pub use service::LoadBalanceService;
pub use stats::{LoadBalancerStats, ServerStats};
