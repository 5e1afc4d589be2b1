//! Middleware for the transport server.
//!
//! `defaults` holds the tower/axum stack wrapped around every listener.
//! `custom_headers` and `static_files` build chain handlers registered
//! into the route table.

pub mod custom_headers;
pub mod defaults;
pub mod static_files;

pub use custom_headers::custom_headers;
pub use defaults::{Cookies, DefaultStack, ParsedBody, NO_COMPRESSION_QUERY};
pub use static_files::{static_files, StaticOptions};
