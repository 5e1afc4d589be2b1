//! Mutable route table and chain dispatch.
//!
//! # Responsibilities
//! - Store middleware, static mounts and routes in registration order
//! - Walk matching layers for each request through an explicit `Next`
//! - Stay mutable while the listener serves traffic
//!
//! # Design Decisions
//! - Append-only between resets; each request dispatches against a snapshot
//! - Duplicate path+method pairs are kept; later ones run only if earlier
//!   handlers call `next`
//! - An exhausted chain answers 404

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;

use crate::routing::matcher::{MountPath, PathPattern};

/// A request handler or middleware. Call `next.run(req)` to continue the chain.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request<Body>, next: Next) -> BoxFuture<'static, Response>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request<Body>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request<Body>, next: Next) -> BoxFuture<'static, Response> {
        Box::pin(self(req, next))
    }
}

pub type BoxedHandler = Arc<dyn Handler>;

/// HTTP verbs a route can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    All,
}

impl RouteMethod {
    /// Whether a request with `method` reaches a route registered under `self`.
    /// GET routes also answer HEAD.
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            RouteMethod::Get => method == Method::GET || method == Method::HEAD,
            RouteMethod::Post => method == Method::POST,
            RouteMethod::Put => method == Method::PUT,
            RouteMethod::Patch => method == Method::PATCH,
            RouteMethod::Delete => method == Method::DELETE,
            RouteMethod::Head => method == Method::HEAD,
            RouteMethod::Options => method == Method::OPTIONS,
            RouteMethod::All => true,
        }
    }
}

/// A registered route: patterns, verb, route-level middleware then handler.
pub struct RouteEntry {
    pub paths: Vec<PathPattern>,
    pub method: RouteMethod,
    stack: Vec<BoxedHandler>,
}

impl RouteEntry {
    pub fn new<P>(paths: impl IntoIterator<Item = P>, method: RouteMethod, handler: BoxedHandler) -> Self
    where
        P: Into<PathPattern>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            method,
            stack: vec![handler],
        }
    }

    /// Middleware running before the handler, in the given order.
    pub fn with_middlewares(mut self, middlewares: Vec<BoxedHandler>) -> Self {
        let handler = self.stack.pop();
        self.stack = middlewares;
        self.stack.extend(handler);
        self
    }

    fn matches(&self, path: &str) -> Option<crate::routing::PathParams> {
        self.paths.iter().find_map(|pattern| pattern.matches(path))
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("paths", &self.paths)
            .field("method", &self.method)
            .field("stack_len", &self.stack.len())
            .finish()
    }
}

#[derive(Clone)]
enum Layer {
    Middleware {
        mount: Option<MountPath>,
        handler: BoxedHandler,
    },
    Route(Arc<RouteEntry>),
}

/// Continuation into the rest of the chain.
#[derive(Clone)]
pub struct Next {
    layers: Arc<Vec<Layer>>,
    position: usize,
    route: Option<(Arc<RouteEntry>, usize)>,
}

impl Next {
    /// Run the next matching layer, or answer 404 when none is left.
    pub fn run(self, mut req: Request<Body>) -> BoxFuture<'static, Response> {
        // Finish the current route's own stack first.
        if let Some((entry, index)) = &self.route {
            if let Some(handler) = entry.stack.get(*index) {
                let next = Next {
                    layers: Arc::clone(&self.layers),
                    position: self.position,
                    route: Some((Arc::clone(entry), index + 1)),
                };
                return handler.call(req, next);
            }
        }

        let path = req.uri().path().to_string();
        for (offset, layer) in self.layers[self.position..].iter().enumerate() {
            let position = self.position + offset + 1;
            match layer {
                Layer::Middleware { mount, handler } => {
                    if mount.as_ref().map_or(true, |m| m.matches(&path)) {
                        let next = Next {
                            layers: Arc::clone(&self.layers),
                            position,
                            route: None,
                        };
                        return handler.call(req, next);
                    }
                }
                Layer::Route(entry) => {
                    if !entry.method.accepts(req.method()) {
                        continue;
                    }
                    if let Some(params) = entry.matches(&path) {
                        req.extensions_mut().insert(params);
                        let next = Next {
                            layers: Arc::clone(&self.layers),
                            position,
                            route: Some((Arc::clone(entry), 0)),
                        };
                        return next.run(req);
                    }
                }
            }
        }

        Box::pin(async { StatusCode::NOT_FOUND.into_response() })
    }
}

/// Registered layers of the active listener.
pub struct RouteTable {
    layers: ArcSwap<Vec<Layer>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            layers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Register middleware for every request at or below `mount`.
    pub fn add_middleware(&self, mount: Option<&str>, handler: BoxedHandler) {
        self.push(Layer::Middleware {
            mount: mount.map(MountPath::new),
            handler,
        });
    }

    /// Append a route after every existing layer.
    pub fn add_route(&self, entry: RouteEntry) {
        self.push(Layer::Route(Arc::new(entry)));
    }

    fn push(&self, layer: Layer) {
        self.layers.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(layer.clone());
            next
        });
    }

    /// Drop every registered layer.
    pub fn clear(&self) {
        self.layers.store(Arc::new(Vec::new()));
    }

    pub fn len(&self) -> usize {
        self.layers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of route layers (middleware excluded).
    pub fn route_count(&self) -> usize {
        self.layers
            .load()
            .iter()
            .filter(|layer| matches!(layer, Layer::Route(_)))
            .count()
    }

    /// Run a request through the current snapshot of the chain.
    pub async fn dispatch(&self, req: Request<Body>) -> Response {
        let next = Next {
            layers: self.layers.load_full(),
            position: 0,
            route: None,
        };
        next.run(req).await
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}
