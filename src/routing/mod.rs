//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → table.rs (snapshot of registered layers)
//!     → matcher.rs (mount prefixes, route patterns, page conditions)
//!     → matched handler, continued through `Next`, or 404
//!
//! Registration:
//!     TransportServer::add_route / use / serve_static
//!     events.rs (RouteEventChannel) → subscriber → TransportServer::add_route
//! ```
//!
//! # Design Decisions
//! - Routes stay mutable for the life of the listener
//! - Registration order is dispatch order; no priorities
//! - No regex in hot path (segment matching only)

pub mod events;
pub mod matcher;
pub mod table;

pub use events::{RouteEventChannel, RouteRequest};
pub use matcher::{Matcher, MountPath, PathParams, PathPattern};
pub use table::{BoxedHandler, Handler, Next, RouteEntry, RouteMethod, RouteTable};
