//! Switchyard Proxy Library
//!
//! This library provides the request proxying core for the Switchyard gateway including:
//! - Route table and discovery-backed route locator
//! - Staged filter pipeline (pre / route / post)
//! - Upstream HTTP transport

pub mod filter;
pub mod routes;
pub mod transport;

// Re-export commonly used types
pub use filter::{
    default_pipeline, FilterPipeline, FilterStage, GatewayFilter, RequestContext,
};
pub use routes::{RouteLocator, RouteTable, RouteTarget, ServiceRoute};
pub use transport::{HttpTransport, ReqwestTransport, UpstreamResponse};
