//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig (port, bind_all_interfaces, protocol options)
//!     → listener.rs (negotiate transport, bind, timeout, serve)
//!     → tls.rs (rustls config + ALPN for TLS / h2)
//!     → axum-server accept loop → HTTP layer
//! ```
//!
//! # Design Decisions
//! - One negotiation per listener start
//! - Credentials are used verbatim; no certificate policy
//! - Shutdown goes through an axum-server handle

pub mod listener;
pub mod tls;

pub use listener::{bind_address, negotiate, Listening, Transport, TransportError};
