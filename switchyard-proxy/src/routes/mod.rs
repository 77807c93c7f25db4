pub mod locator;
pub mod table;

pub use locator::RouteLocator;
pub use table::{RouteTable, RouteTarget, ServiceRoute};
