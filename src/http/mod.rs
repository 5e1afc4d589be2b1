//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (net::listener, negotiated transport)
//!     → server.rs (TransportServer: axum app over the route table)
//!     → middleware/defaults.rs (timing, access log, security headers,
//!       body and cookie parsing, compression)
//!     → routing::RouteTable (use / static / routes in registration order)
//!     → handlers.rs (health check, debug script) or page handlers
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::TransportServer;
