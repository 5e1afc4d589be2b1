//! Storefront: composes pages from upstream gateway fragments and serves them
//! once every gateway has reported ready.

pub mod config;
pub mod dependency;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod page;
pub mod routing;

pub use config::schema::StorefrontConfig;
pub use http::TransportServer;
pub use lifecycle::{BootstrapError, Shutdown, Stage, Storefront};
pub use routing::{RouteEventChannel, RouteRequest};
