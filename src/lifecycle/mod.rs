//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (storefront.rs + pipeline.rs):
//!     Build gateways/pages → start gateway polling
//!     → run bootstrap stages in order (fail fast)
//!     → listen
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     Signal received → stop gateway polling → close listener
//! ```
//!
//! # Design Decisions
//! - Ordered startup: a stage never starts before the previous one finished
//! - The pipeline runs at most once per Storefront
//! - Listener starts last (traffic only when ready)

pub mod pipeline;
pub mod shutdown;
pub mod signals;
pub mod storefront;

pub use pipeline::{BootstrapError, Stage};
pub use shutdown::Shutdown;
pub use storefront::Storefront;
