//! HTTP-polling gateway.
//!
//! # Responsibilities
//! - Periodically fetch the upstream fragment document
//! - Keep the latest successful body for page rendering
//! - Report ready once, after the first successful fetch

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use axum::body::Body;
use axum::http::{Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::GatewayConfig;
use crate::gateway::{Gateway, GatewayError, ReadySignal};

/// Upper bound on a fetched fragment document.
const MAX_CONTENT_BYTES: usize = 4 * 1024 * 1024;

pub struct HttpGateway {
    config: GatewayConfig,
    uri: Uri,
    client: Client<HttpConnector, Body>,
    ready: AtomicBool,
    content: ArcSwapOption<String>,
}

impl HttpGateway {
    /// Validate the config and build the upstream client. Nothing is fetched yet.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        for (field, value) in [("interval_ms", config.interval_ms), ("timeout_ms", config.timeout_ms)] {
            if value == 0 {
                return Err(GatewayError::ZeroDuration {
                    gateway: config.name.clone(),
                    field,
                });
            }
        }

        let invalid = |reason: String| GatewayError::InvalidUrl {
            url: config.url.clone(),
            reason,
        };

        let parsed = url::Url::parse(&config.url).map_err(|e| invalid(e.to_string()))?;
        if parsed.scheme() != "http" {
            return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
        }
        let uri: Uri = parsed
            .as_str()
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| invalid(e.to_string()))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            config,
            uri,
            client,
            ready: AtomicBool::new(false),
            content: ArcSwapOption::empty(),
        })
    }

    /// Fetch the upstream once and store the body on success.
    pub async fn poll_once(&self) -> Result<(), GatewayError> {
        let request = Request::builder()
            .method("GET")
            .uri(self.uri.clone())
            .header("user-agent", "storefront-gateway")
            .body(Body::empty())
            .map_err(|e| GatewayError::InvalidUrl {
                url: self.config.url.clone(),
                reason: e.to_string(),
            })?;

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let response = match time::timeout(timeout, self.client.request(request)).await {
            Ok(result) => result?,
            Err(_) => return Err(GatewayError::Timeout(timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status));
        }

        let bytes = axum::body::to_bytes(Body::new(response.into_body()), MAX_CONTENT_BYTES).await?;
        self.content
            .store(Some(Arc::new(String::from_utf8_lossy(&bytes).into_owned())));
        Ok(())
    }
}

impl Gateway for HttpGateway {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn content(&self) -> Option<Arc<String>> {
        self.content.load_full()
    }

    fn start_polling(
        self: Arc<Self>,
        ready: ReadySignal,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                gateway = %self.config.name,
                url = %self.config.url,
                interval_ms = self.config.interval_ms,
                "Gateway polling started"
            );

            let mut ticker = time::interval(Duration::from_millis(self.config.interval_ms));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.poll_once().await {
                            Ok(()) => {
                                if !self.ready.swap(true, Ordering::SeqCst) {
                                    ready.fire();
                                }
                            }
                            Err(e) => {
                                tracing::warn!(gateway = %self.config.name, error = %e, "Gateway update failed");
                            }
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!(gateway = %self.config.name, "Gateway polling stopped");
                        break;
                    }
                }
            }
        })
    }
}
