//! Route registration requests from components without a server reference.
//!
//! The channel is an explicit handle rather than a process global. Cloning it
//! shares the subscriber list. Delivery is synchronous and in subscription
//! order; an event published with no subscriber is dropped.

use std::sync::{Arc, Mutex, PoisonError};

use crate::routing::table::{BoxedHandler, RouteMethod};

/// Payload of a "route requested" event.
#[derive(Clone)]
pub struct RouteRequest {
    pub paths: Vec<String>,
    pub method: RouteMethod,
    pub handler: BoxedHandler,
}

impl RouteRequest {
    pub fn new(path: impl Into<String>, method: RouteMethod, handler: BoxedHandler) -> Self {
        Self {
            paths: vec![path.into()],
            method,
            handler,
        }
    }
}

impl std::fmt::Debug for RouteRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteRequest")
            .field("paths", &self.paths)
            .field("method", &self.method)
            .finish()
    }
}

type Subscriber = Arc<dyn Fn(RouteRequest) + Send + Sync>;

#[derive(Clone, Default)]
pub struct RouteEventChannel {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl RouteEventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber called for every published request.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(RouteRequest) + Send + Sync + 'static,
    {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(subscriber));
    }

    /// Deliver to every subscriber. Returns how many received the event.
    pub fn publish(&self, request: RouteRequest) -> usize {
        // Snapshot so a subscriber may publish or subscribe without deadlocking.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if subscribers.is_empty() {
            tracing::debug!(paths = ?request.paths, "Route request dropped: no subscribers");
            return 0;
        }

        for subscriber in &subscribers {
            subscriber(request.clone());
        }
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::table::Next;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::IntoResponse;

    fn request(path: &str) -> RouteRequest {
        RouteRequest::new(
            path,
            RouteMethod::Get,
            Arc::new(|_req: Request<Body>, _next: Next| async { "ok".into_response() }),
        )
    }

    #[test]
    fn event_without_subscriber_is_lost() {
        let channel = RouteEventChannel::new();
        assert_eq!(channel.publish(request("/lost")), 0);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        channel.subscribe(move |req| sink.lock().unwrap().push(req.paths[0].clone()));

        channel.publish(request("/kept"));
        assert_eq!(*seen.lock().unwrap(), vec!["/kept".to_string()]);
    }

    #[test]
    fn subscribers_run_in_order() {
        let channel = RouteEventChannel::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for id in 0..3 {
            let order = Arc::clone(&order);
            channel.subscribe(move |_| order.lock().unwrap().push(id));
        }

        assert_eq!(channel.publish(request("/x")), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn clones_share_subscribers() {
        let channel = RouteEventChannel::new();
        let publisher = channel.clone();
        channel.subscribe(|_| {});
        assert_eq!(publisher.subscriber_count(), 1);
        assert_eq!(publisher.publish(request("/x")), 1);
    }
}
