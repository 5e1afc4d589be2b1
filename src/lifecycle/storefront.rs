//! The orchestrating service.
//!
//! # Responsibilities
//! - Own configuration, gateways, pages and the transport server
//! - Forward route events into the server
//! - Run the bootstrap pipeline once, then listen
//!
//! # Lifecycle
//! ```text
//! new ──► start_gateways ──► init (pipeline, once) ──► listen ──► shutdown
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use crate::config::StorefrontConfig;
use crate::dependency::{DependencyCatalog, DependencyRegistry};
use crate::gateway::{Gateway, HttpGateway, ReadinessBarrier};
use crate::http::middleware::DefaultStack;
use crate::http::TransportServer;
use crate::lifecycle::pipeline::{self, BootstrapError, Stage, StageContext};
use crate::lifecycle::Shutdown;
use crate::net::TransportError;
use crate::page::{Page, TemplatePage};
use crate::routing::RouteEventChannel;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const FAILED: u8 = 3;

pub struct Storefront {
    config: StorefrontConfig,
    server: TransportServer,
    route_events: RouteEventChannel,
    gateways: Vec<Arc<dyn Gateway>>,
    pages: Vec<Arc<dyn Page>>,
    registry: Arc<dyn DependencyRegistry>,
    barrier: Arc<ReadinessBarrier>,
    shutdown: Shutdown,
    state: AtomicU8,
    completed: Mutex<Vec<Stage>>,
    polling: Mutex<Vec<JoinHandle<()>>>,
}

impl Storefront {
    /// Build HTTP gateways, template pages and an in-memory registry from config.
    pub fn from_config(config: StorefrontConfig) -> Result<Self, BootstrapError> {
        let gateways = config
            .gateways
            .iter()
            .map(|gateway| {
                HttpGateway::new(gateway.clone())
                    .map(|g| Arc::new(g) as Arc<dyn Gateway>)
                    .map_err(|source| BootstrapError::Gateway {
                        name: gateway.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pages = config
            .pages
            .iter()
            .map(|page| {
                let used = gateways
                    .iter()
                    .filter(|g| page.gateways.iter().any(|name| name == g.name()))
                    .cloned()
                    .collect();
                Arc::new(TemplatePage::new(page.clone(), used)) as Arc<dyn Page>
            })
            .collect();

        Self::new(config, gateways, pages, Arc::new(DependencyCatalog::new()))
    }

    /// Wire a storefront from already-built gateways and pages.
    ///
    /// Gateway and page names must be unique. Nothing starts yet.
    pub fn new(
        config: StorefrontConfig,
        gateways: Vec<Arc<dyn Gateway>>,
        pages: Vec<Arc<dyn Page>>,
        registry: Arc<dyn DependencyRegistry>,
    ) -> Result<Self, BootstrapError> {
        ensure_unique("gateway", gateways.iter().map(|g| g.name()))?;
        ensure_unique("page", pages.iter().map(|p| p.name()))?;

        let server = TransportServer::new(DefaultStack::from_config(&config));
        server.configure_protocol(config.server.protocol.clone());

        let route_events = RouteEventChannel::new();
        {
            let server = server.clone();
            route_events.subscribe(move |request| {
                server.add_route(request.paths, request.method, request.handler, Vec::new());
            });
        }

        let barrier = Arc::new(ReadinessBarrier::new(gateways.iter().map(|g| g.name().to_string())));

        Ok(Self {
            config,
            server,
            route_events,
            gateways,
            pages,
            registry,
            barrier,
            shutdown: Shutdown::new(),
            state: AtomicU8::new(PENDING),
            completed: Mutex::new(Vec::new()),
            polling: Mutex::new(Vec::new()),
        })
    }

    /// Handle for components that register routes without a server reference.
    pub fn route_events(&self) -> RouteEventChannel {
        self.route_events.clone()
    }

    /// Server the pipeline registers routes on.
    pub fn server(&self) -> &TransportServer {
        &self.server
    }

    /// Config the storefront was built with.
    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    /// Barrier counting ready gateways.
    pub fn barrier(&self) -> &Arc<ReadinessBarrier> {
        &self.barrier
    }

    /// Spawn every gateway's polling loop. Runs at most once.
    pub fn start_gateways(&self) {
        let mut polling = self.polling.lock().unwrap_or_else(PoisonError::into_inner);
        if !polling.is_empty() || self.gateways.is_empty() {
            return;
        }
        for gateway in &self.gateways {
            let signal = self.barrier.signal_for(gateway.name());
            let handle = Arc::clone(gateway).start_polling(signal, self.shutdown.subscribe());
            polling.push(handle);
        }
        tracing::info!(count = polling.len(), "Gateways started");
    }

    /// Run the bootstrap pipeline. Only the first call runs it.
    pub async fn init(&self) -> Result<(), BootstrapError> {
        if self
            .state
            .compare_exchange(PENDING, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Bootstrap already ran");
            return Ok(());
        }

        let ctx = StageContext {
            config: &self.config,
            server: &self.server,
            pages: &self.pages,
            registry: self.registry.as_ref(),
            barrier: &self.barrier,
        };

        match pipeline::run(&ctx, &self.completed).await {
            Ok(()) => {
                self.state.store(COMPLETED, Ordering::SeqCst);
                tracing::info!("Bootstrap complete");
                Ok(())
            }
            Err(e) => {
                self.state.store(FAILED, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// True once every bootstrap stage has completed.
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::SeqCst) == COMPLETED
    }

    /// Stages that finished, in the order they ran.
    pub fn completed_stages(&self) -> Vec<Stage> {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start gateways, bootstrap, then listen on the configured port.
    ///
    /// Nothing listens unless every stage succeeded.
    pub async fn start<F>(&self, on_ready: F) -> Result<SocketAddr, BootstrapError>
    where
        F: FnOnce(Result<SocketAddr, &TransportError>) + Send,
    {
        self.start_gateways();
        self.init().await?;
        if !self.is_initialized() {
            return Err(BootstrapError::Incomplete);
        }

        let server = &self.config.server;
        let addr = self
            .server
            .listen(server.port, server.bind_all_interfaces, on_ready)
            .await?;
        tracing::info!(address = %addr, "Storefront listening");
        Ok(addr)
    }

    /// Stop gateway polling and close the server.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let notified = self.shutdown.trigger();
        let handles: Vec<_> = self
            .polling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Gateway task ended abnormally");
            }
        }
        tracing::info!(gateways = notified, "Gateway polling stopped");
        self.server.close().await
    }
}

fn ensure_unique<'a>(kind: &'static str, names: impl Iterator<Item = &'a str>) -> Result<(), BootstrapError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(BootstrapError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
