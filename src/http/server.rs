//! Transport server.
//!
//! # Responsibilities
//! - Own the route table of the active listener
//! - Expose middleware, static mount and route registration
//! - Negotiate and start the listener once per active instance
//! - Close and reset to an empty table with the default middleware stack
//!
//! # Design Decisions
//! - Cheap to clone; clones share one table and one listener slot
//! - The table stays mutable while serving, so routes can arrive at runtime
//! - The default middleware stack wraps the table as tower layers and is
//!   rebuilt for every listen, so a reset never loses it

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{body::Body, extract::State, http::Request, response::Response, Router};

use crate::config::{CustomHeader, ProtocolOptions};
use crate::http::middleware::{custom_headers, static_files, DefaultStack, StaticOptions};
use crate::net::listener::{self, bind_address, negotiate, Listening, Transport, TransportError};
use crate::routing::{BoxedHandler, PathPattern, RouteEntry, RouteMethod, RouteTable};

struct ServerInner {
    table: Arc<RouteTable>,
    defaults: DefaultStack,
    protocol: Mutex<Option<ProtocolOptions>>,
    active: tokio::sync::Mutex<Option<Listening>>,
}

#[derive(Clone)]
pub struct TransportServer {
    inner: Arc<ServerInner>,
}

impl TransportServer {
    /// Server with an empty route table. Nothing listens until `listen`.
    pub fn new(defaults: DefaultStack) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                table: Arc::new(RouteTable::new()),
                defaults,
                protocol: Mutex::new(None),
                active: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Store protocol options for the next listen. `None` leaves them unchanged.
    pub fn configure_protocol(&self, options: Option<ProtocolOptions>) {
        if let Some(options) = options {
            *self.inner.protocol.lock().unwrap_or_else(PoisonError::into_inner) = Some(options);
        }
    }

    /// Register middleware for every request at or below `path` (all requests for `None`).
    pub fn use_middleware(&self, path: Option<&str>, handler: BoxedHandler) {
        self.inner.table.add_middleware(path, handler);
    }

    /// Serve files from `dir` at or below `path`. Misses reach later layers when `fallthrough` is set.
    pub fn serve_static(&self, path: Option<&str>, dir: impl AsRef<Path>, options: StaticOptions) {
        tracing::debug!(mount = path.unwrap_or("/"), dir = %dir.as_ref().display(), "Static mount");
        let handler = static_files(path, dir, options);
        self.inner.table.add_middleware(path, handler);
    }

    /// Append a route. Duplicates are kept in registration order.
    pub fn add_route<P>(
        &self,
        paths: impl IntoIterator<Item = P>,
        method: RouteMethod,
        handler: BoxedHandler,
        middlewares: Vec<BoxedHandler>,
    ) where
        P: Into<PathPattern>,
    {
        let entry = RouteEntry::new(paths, method, handler).with_middlewares(middlewares);
        tracing::debug!(
            paths = ?entry.paths.iter().map(PathPattern::as_str).collect::<Vec<_>>(),
            method = ?entry.method,
            "Route registered"
        );
        self.inner.table.add_route(entry);
    }

    /// Install one global middleware setting the configured headers.
    pub fn add_custom_headers(&self, headers: &[CustomHeader]) {
        tracing::debug!(count = headers.len(), "Custom headers installed");
        self.use_middleware(None, custom_headers(headers));
    }

    /// The application served by listeners: default stack around the route table.
    pub fn router(&self) -> Router {
        let app = Router::new()
            .fallback(dispatch)
            .with_state(Arc::clone(&self.inner.table));
        self.inner.defaults.apply(app)
    }

    /// Shared route table consulted by the fallback handler.
    pub fn route_table(&self) -> &RouteTable {
        &self.inner.table
    }

    /// Negotiate the transport and start listening.
    ///
    /// `on_ready` runs once with the bind outcome, which is also returned.
    pub async fn listen<F>(&self, port: u16, bind_all: bool, on_ready: F) -> Result<SocketAddr, TransportError>
    where
        F: FnOnce(Result<SocketAddr, &TransportError>) + Send,
    {
        let mut active = self.inner.active.lock().await;
        if active.is_some() {
            let err = TransportError::AlreadyListening;
            on_ready(Err(&err));
            return Err(err);
        }

        let options = self
            .inner
            .protocol
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let transport = negotiate(options.as_ref());
        let addr = bind_address(port, bind_all);

        match listener::start(addr, transport, options.as_ref(), self.router()).await {
            Ok(listening) => {
                let local = listening.addr;
                *active = Some(listening);
                on_ready(Ok(local));
                Ok(local)
            }
            Err(e) => {
                tracing::error!(address = %addr, transport = %transport, error = %e, "Listener failed to start");
                on_ready(Err(&e));
                Err(e)
            }
        }
    }

    /// Bound address while listening.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.active.lock().await.as_ref().map(|l| l.addr)
    }

    /// Negotiated transport while listening.
    pub async fn transport(&self) -> Option<Transport> {
        self.inner.active.lock().await.as_ref().map(|l| l.transport)
    }

    /// Stop the listener (if any) and reset. Every registered route is lost.
    pub async fn close(&self) -> Result<(), TransportError> {
        let listening = self.inner.active.lock().await.take();
        let result = match listening {
            Some(listening) => {
                let addr = listening.addr;
                let result = listening.shutdown().await;
                tracing::info!(address = %addr, "Listener closed");
                result
            }
            None => Ok(()),
        };
        self.reset();
        result
    }

    /// Empty the route table. The default stack is reapplied on the next listen.
    pub fn reset(&self) {
        self.inner.table.clear();
        tracing::debug!("Route table reset");
    }
}

impl Default for TransportServer {
    fn default() -> Self {
        Self::new(DefaultStack::default())
    }
}

async fn dispatch(State(table): State<Arc<RouteTable>>, req: Request<Body>) -> Response {
    table.dispatch(req).await
}
