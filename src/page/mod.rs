//! Pages bound to URLs.
//!
//! A page is compiled once during bootstrap, then answers GET (behind its
//! optional routing condition) and POST on each of its URLs.

pub mod template;

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::config::ConditionConfig;
use crate::routing::matcher::{AndMatcher, CookieMatcher, HeaderMatcher, Matcher, QueryMatcher};
use crate::routing::{BoxedHandler, Next};

pub use template::TemplatePage;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("failed to load template {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Compile(String),
}

pub trait Page: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn urls(&self) -> &[String];

    /// Request condition gating GET. `None` always matches.
    fn condition(&self) -> Option<&dyn Matcher> {
        None
    }

    /// Prepare the page for serving.
    fn compile(&self) -> BoxFuture<'_, Result<(), PageError>>;

    fn handle(&self, req: Request<Body>) -> BoxFuture<'_, Response>;

    fn post(&self, req: Request<Body>, next: Next) -> BoxFuture<'_, Response>;
}

/// GET handler: evaluate the condition, then render or continue the chain.
pub fn get_handler(page: Arc<dyn Page>) -> BoxedHandler {
    Arc::new(move |req: Request<Body>, next: Next| {
        let page = Arc::clone(&page);
        async move {
            if let Some(condition) = page.condition() {
                if !condition.matches(&req) {
                    return next.run(req).await;
                }
            }
            page.handle(req).await
        }
    })
}

/// Route handler delegating POSTs to `page`. No condition check.
pub fn post_handler(page: Arc<dyn Page>) -> BoxedHandler {
    Arc::new(move |req: Request<Body>, next: Next| {
        let page = Arc::clone(&page);
        async move { page.post(req, next).await }
    })
}

/// Compile a declarative condition. An empty condition yields `None`.
pub fn build_condition(config: &ConditionConfig) -> Option<Box<dyn Matcher>> {
    let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
    if let Some(header) = &config.header {
        matchers.push(Box::new(HeaderMatcher::new(&header.name, &header.value)));
    }
    if let Some(cookie) = &config.cookie {
        matchers.push(Box::new(CookieMatcher::new(&cookie.name, &cookie.value)));
    }
    if let Some(query) = &config.query {
        matchers.push(Box::new(QueryMatcher::new(query)));
    }

    match matchers.len() {
        0 => None,
        1 => matchers.pop(),
        _ => Some(Box::new(AndMatcher::new(matchers))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameValue;

    #[test]
    fn empty_condition_is_none() {
        assert!(build_condition(&ConditionConfig::default()).is_none());
    }

    #[test]
    fn combined_condition_requires_every_clause() {
        let condition = build_condition(&ConditionConfig {
            header: Some(NameValue {
                name: "x-variant".into(),
                value: "b".into(),
            }),
            cookie: None,
            query: Some("beta".into()),
        })
        .unwrap();

        let both = Request::builder()
            .uri("/home?beta")
            .header("x-variant", "b")
            .body(Body::empty())
            .unwrap();
        let header_only = Request::builder()
            .uri("/home")
            .header("x-variant", "b")
            .body(Body::empty())
            .unwrap();
        assert!(condition.matches(&both));
        assert!(!condition.matches(&header_only));
    }
}
