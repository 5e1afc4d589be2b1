//! Path patterns and request conditions.
//!
//! # Responsibilities
//! - Match request paths against route patterns (`/product/:id`, `/assets/*`)
//! - Match mount prefixes on segment boundaries
//! - Evaluate page routing conditions (header, cookie, query)
//!
//! # Design Decisions
//! - Header names are case-insensitive, values are not
//! - Path matching is case-sensitive
//! - Trailing slashes are ignored
//! - No regex to guarantee O(n) matching

use std::collections::HashMap;

use axum::body::Body;
use axum::http::Request;

use crate::http::middleware::Cookies;

/// Captured `:name` segments of the matched route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(pub HashMap<String, String>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// A compiled route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let segments = split(&raw)
            .map(|segment| {
                if segment == "*" {
                    Segment::Wildcard
                } else if let Some(name) = segment.strip_prefix(':') {
                    Segment::Param(name.to_string())
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match the whole path, returning captured parameters.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let mut params = HashMap::new();
        let mut parts = split(path);

        for segment in &self.segments {
            match segment {
                Segment::Wildcard => return Some(PathParams(params)),
                Segment::Literal(expected) => {
                    if parts.next()? != expected {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), parts.next()?.to_string());
                }
            }
        }

        match parts.next() {
            Some(_) => None,
            None => Some(PathParams(params)),
        }
    }
}

impl From<&str> for PathPattern {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for PathPattern {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

/// A mount point for middleware and static directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPath {
    segments: Vec<String>,
}

impl MountPath {
    pub fn new(prefix: &str) -> Self {
        Self {
            segments: split(prefix).map(str::to_string).collect(),
        }
    }

    /// True when `path` is at or below this mount point.
    pub fn matches(&self, path: &str) -> bool {
        self.strip(path).is_some()
    }

    /// The remainder of `path` below the mount point, always starting with `/`.
    pub fn strip(&self, path: &str) -> Option<String> {
        let mut parts = split(path);
        for expected in &self.segments {
            if parts.next()? != expected {
                return None;
            }
        }
        let rest: Vec<&str> = parts.collect();
        Some(format!("/{}", rest.join("/")))
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Matches a header value exactly.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: String,
    value: String,
}

impl HeaderMatcher {
    /// The header name is normalized to lowercase for case-insensitive lookup.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            value: value.into(),
        }
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.headers()
            .get(self.name.as_str())
            .and_then(|h| h.to_str().ok())
            .map(|h| h == self.value)
            .unwrap_or(false)
    }
}

/// Matches a cookie value exactly.
///
/// Reads the parsed `Cookies` extension when present, the raw header otherwise.
#[derive(Debug, Clone)]
pub struct CookieMatcher {
    name: String,
    value: String,
}

impl CookieMatcher {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Matcher for CookieMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        let found = match req.extensions().get::<Cookies>() {
            Some(cookies) => cookies.get(&self.name).map(str::to_string),
            None => Cookies::from_headers(req.headers())
                .get(&self.name)
                .map(str::to_string),
        };
        found.as_deref() == Some(self.value.as_str())
    }
}

/// Matches when the query string carries the named parameter.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    name: String,
}

impl QueryMatcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Matcher for QueryMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        has_query_param(req.uri().query(), &self.name)
    }
}

/// True when `query` contains `name`, with or without a value.
pub fn has_query_param(query: Option<&str>, name: &str) -> bool {
    query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).any(|(key, _)| key == name))
        .unwrap_or(false)
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        // All matchers must pass (AND)
        self.matchers.iter().all(|m| m.matches(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn literal_pattern() {
        let pattern = PathPattern::new("/home");
        assert!(pattern.matches("/home").is_some());
        assert!(pattern.matches("/home/").is_some());
        assert!(pattern.matches("/home/more").is_none());
        assert!(pattern.matches("/Home").is_none());
    }

    #[test]
    fn root_pattern_only_matches_root() {
        let pattern = PathPattern::new("/");
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/home").is_none());
    }

    #[test]
    fn params_are_captured() {
        let pattern = PathPattern::new("/product/:id/reviews");
        let params = pattern.matches("/product/42/reviews").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert!(pattern.matches("/product/42").is_none());
    }

    #[test]
    fn wildcard_matches_rest() {
        let pattern = PathPattern::new("/assets/*");
        assert!(pattern.matches("/assets/js/app.js").is_some());
        assert!(pattern.matches("/assets").is_some());
        assert!(pattern.matches("/other/app.js").is_none());
    }

    #[test]
    fn mount_matches_segment_boundaries() {
        let mount = MountPath::new("/static");
        assert!(mount.matches("/static"));
        assert!(mount.matches("/static/app.js"));
        assert!(!mount.matches("/statically"));
        assert_eq!(mount.strip("/static/js/app.js").as_deref(), Some("/js/app.js"));
        assert_eq!(mount.strip("/static").as_deref(), Some("/"));
        assert!(MountPath::new("/").matches("/anything"));
    }

    #[test]
    fn header_matcher_is_case_insensitive_on_name() {
        let matcher = HeaderMatcher::new("X-Variant", "beta");
        let req = Request::builder()
            .header("x-variant", "beta")
            .body(Body::empty())
            .unwrap();
        assert!(matcher.matches(&req));
        assert!(!matcher.matches(&get("/")));
    }

    #[test]
    fn cookie_matcher_reads_header() {
        let matcher = CookieMatcher::new("ab", "b");
        let req = Request::builder()
            .header("cookie", "session=1; ab=b")
            .body(Body::empty())
            .unwrap();
        assert!(matcher.matches(&req));
    }

    #[test]
    fn query_matcher() {
        let matcher = QueryMatcher::new("beta");
        assert!(matcher.matches(&get("/home?beta")));
        assert!(matcher.matches(&get("/home?x=1&beta=yes")));
        assert!(!matcher.matches(&get("/home?alpha=1")));
        assert!(!matcher.matches(&get("/home")));
    }

    #[test]
    fn and_matcher_requires_all() {
        let matcher = AndMatcher::new(vec![
            Box::new(QueryMatcher::new("beta")),
            Box::new(HeaderMatcher::new("x-variant", "b")),
        ]);
        let both = Request::builder()
            .uri("/?beta")
            .header("x-variant", "b")
            .body(Body::empty())
            .unwrap();
        assert!(matcher.matches(&both));
        assert!(!matcher.matches(&get("/?beta")));
    }
}
