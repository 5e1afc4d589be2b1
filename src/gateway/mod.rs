//! Upstream fragment providers.
//!
//! # Data Flow
//! ```text
//! GatewayConfig
//!     → http.rs (HttpGateway polls its upstream on an interval)
//!     → first successful poll → ReadySignal::fire (once)
//!     → readiness.rs (ReadinessBarrier counts distinct gateways)
//!     → bootstrap waits until every gateway reported
//! ```

pub mod http;
pub mod readiness;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub use self::http::HttpGateway;
pub use self::readiness::{ReadinessBarrier, ReadinessTimeout, ReadySignal};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid gateway url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("gateway '{gateway}': {field} must be greater than zero")]
    ZeroDuration { gateway: String, field: &'static str },
    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("upstream answered {0}")]
    Status(axum::http::StatusCode),
    #[error("upstream timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("failed to read upstream body: {0}")]
    Body(#[from] axum::Error),
}

/// An upstream service that keeps its own content fresh.
pub trait Gateway: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Set once the first update succeeded; never cleared.
    fn is_ready(&self) -> bool;

    /// Latest fragment content, if any update succeeded.
    fn content(&self) -> Option<Arc<String>>;

    /// Spawn the update loop. `ready` must be fired after the first success.
    fn start_polling(
        self: Arc<Self>,
        ready: ReadySignal,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()>;
}
