//! Default middleware stack.
//!
//! Request order:
//! 1. timing (metrics + `x-response-time`)
//! 2. access log with request ids (optional)
//! 3. security headers (optional)
//! 4. body parsing (JSON, URL-encoded)
//! 5. cookie parsing
//! 6. compression, bypassed by the `nocompress` query parameter

use std::collections::HashMap;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        Request, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::StorefrontConfig;
use crate::observability::metrics;
use crate::routing::matcher::has_query_param;

/// Query parameter that turns response compression off for one request.
pub const NO_COMPRESSION_QUERY: &str = "nocompress";

pub const X_RESPONSE_TIME: HeaderName = HeaderName::from_static("x-response-time");

/// Which optional layers the default stack carries.
#[derive(Debug, Clone)]
pub struct DefaultStack {
    pub access_log: bool,
    pub security_headers: bool,
    pub max_body_size: usize,
}

impl DefaultStack {
    /// Default stack settings derived from the security and observability sections.
    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self {
            access_log: config.observability.access_log,
            security_headers: config.security.headers,
            max_body_size: config.security.max_body_size,
        }
    }

    /// Wrap `router` in the stack. Layers added last run first.
    pub fn apply(&self, router: Router) -> Router {
        let mut router = router
            .layer(CompressionLayer::new())
            .layer(middleware::from_fn(bypass_compression))
            .layer(middleware::from_fn(parse_cookies))
            .layer(middleware::from_fn_with_state(self.max_body_size, parse_body));

        if self.security_headers {
            router = with_security_headers(router);
        }

        if self.access_log {
            router = router
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId));
        }

        router.layer(middleware::from_fn(request_timing))
    }
}

impl Default for DefaultStack {
    fn default() -> Self {
        Self::from_config(&StorefrontConfig::default())
    }
}

async fn request_timing(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();

    let mut response = next.run(req).await;

    let elapsed = start.elapsed();
    metrics::record_request(&method, response.status().as_u16(), elapsed);
    let millis = format!("{:.3}ms", elapsed.as_secs_f64() * 1000.0);
    if let Ok(value) = HeaderValue::from_str(&millis) {
        response.headers_mut().insert(X_RESPONSE_TIME, value);
    }
    response
}

#[derive(Clone, Default)]
struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

fn with_security_headers(router: Router) -> Router {
    const HARDENING: [(HeaderName, &str); 6] = [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
        (header::REFERRER_POLICY, "no-referrer"),
        (header::X_DNS_PREFETCH_CONTROL, "off"),
        (HeaderName::from_static("x-download-options"), "noopen"),
        (header::STRICT_TRANSPORT_SECURITY, "max-age=15552000; includeSubDomains"),
    ];

    HARDENING.into_iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            name,
            HeaderValue::from_static(value),
        ))
    })
}

/// Request body decoded by the body-parsing layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

enum BodyKind {
    Json,
    Form,
}

fn body_kind(headers: &HeaderMap) -> Option<BodyKind> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence == "application/json" || essence.ends_with("+json") {
        Some(BodyKind::Json)
    } else if essence == "application/x-www-form-urlencoded" {
        Some(BodyKind::Form)
    } else {
        None
    }
}

async fn parse_body(State(limit): State<usize>, req: Request<Body>, next: Next) -> Response {
    let Some(kind) = body_kind(req.headers()) else {
        return next.run(req).await;
    };

    let (mut parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, limit, "Rejecting request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let parsed = match kind {
        BodyKind::Json if bytes.is_empty() => None,
        BodyKind::Json => match serde_json::from_slice(&bytes) {
            Ok(value) => Some(ParsedBody::Json(value)),
            Err(e) => {
                tracing::debug!(error = %e, "Malformed JSON body");
                return (StatusCode::BAD_REQUEST, "Malformed JSON body").into_response();
            }
        },
        BodyKind::Form => Some(ParsedBody::Form(
            url::form_urlencoded::parse(&bytes).into_owned().collect(),
        )),
    };

    if let Some(parsed) = parsed {
        parts.extensions.insert(parsed);
    }
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Request cookies, first occurrence of a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = HashMap::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            for cookie in cookie::Cookie::split_parse(raw).flatten() {
                cookies
                    .entry(cookie.name().to_string())
                    .or_insert_with(|| cookie.value().to_string());
            }
        }
        Self(cookies)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

async fn parse_cookies(mut req: Request<Body>, next: Next) -> Response {
    let cookies = Cookies::from_headers(req.headers());
    req.extensions_mut().insert(cookies);
    next.run(req).await
}

async fn bypass_compression(mut req: Request<Body>, next: Next) -> Response {
    if has_query_param(req.uri().query(), NO_COMPRESSION_QUERY) {
        req.headers_mut().remove(header::ACCEPT_ENCODING);
    }
    next.run(req).await
}
