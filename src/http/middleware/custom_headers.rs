//! Configured response headers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};

use crate::config::CustomHeader;
use crate::routing::{BoxedHandler, Next};

/// Middleware setting every configured header on the response.
///
/// Values are resolved per request, so an env-sourced header follows the
/// current environment. A header already set further down the chain is kept.
/// Entries with an invalid name are skipped once at install time.
pub fn custom_headers(headers: &[CustomHeader]) -> BoxedHandler {
    let headers: Arc<[(HeaderName, CustomHeader)]> = headers
        .iter()
        .filter_map(|header| match HeaderName::from_bytes(header.key.as_bytes()) {
            Ok(name) => Some((name, header.clone())),
            Err(e) => {
                tracing::warn!(key = %header.key, error = %e, "Skipping invalid custom header");
                None
            }
        })
        .collect();

    Arc::new(move |req: Request<Body>, next: Next| {
        let headers = Arc::clone(&headers);
        async move {
            let resolved: Vec<(HeaderName, HeaderValue)> = headers
                .iter()
                .filter_map(|(name, header)| {
                    HeaderValue::from_str(&header.resolve())
                        .ok()
                        .map(|value| (name.clone(), value))
                })
                .collect();

            let mut response = next.run(req).await;
            for (name, value) in resolved {
                if !response.headers().contains_key(&name) {
                    response.headers_mut().insert(name, value);
                }
            }
            response
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{RouteEntry, RouteMethod, RouteTable};
    use axum::response::IntoResponse;

    fn header(key: &str, value: &str, env: bool) -> CustomHeader {
        CustomHeader {
            key: key.into(),
            value: value.into(),
            env,
        }
    }

    fn table_with(headers: &[CustomHeader]) -> RouteTable {
        let table = RouteTable::new();
        table.add_middleware(None, custom_headers(headers));
        table.add_route(RouteEntry::new(
            ["/"],
            RouteMethod::Get,
            Arc::new(|_req: Request<Body>, _next: Next| async {
                ([("x-owned", "handler")], "ok").into_response()
            }),
        ));
        table
    }

    #[tokio::test]
    async fn resolves_env_and_literal_values() {
        std::env::set_var("STOREFRONT_CUSTOM_HEADER_FOO", "bar");
        let table = table_with(&[
            header("X", "STOREFRONT_CUSTOM_HEADER_FOO", true),
            header("Y", "STOREFRONT_CUSTOM_HEADER_UNSET", true),
            header("Z", "literal", false),
        ]);

        let response = table
            .dispatch(Request::get("/").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.headers()["x"], "bar");
        assert_eq!(response.headers()["y"], "STOREFRONT_CUSTOM_HEADER_UNSET");
        assert_eq!(response.headers()["z"], "literal");
    }

    #[tokio::test]
    async fn handler_headers_take_precedence() {
        let table = table_with(&[header("x-owned", "middleware", false)]);
        let response = table
            .dispatch(Request::get("/").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.headers()["x-owned"], "handler");
    }

    #[tokio::test]
    async fn invalid_names_are_skipped() {
        let table = table_with(&[header("bad header", "v", false), header("good", "v", false)]);
        let response = table
            .dispatch(Request::get("/").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.headers()["good"], "v");
    }
}
