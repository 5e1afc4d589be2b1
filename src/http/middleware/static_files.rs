//! Static directory mounts.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::routing::{BoxedHandler, MountPath, Next};

#[derive(Debug, Clone)]
pub struct StaticOptions {
    /// Continue the chain when no file matches.
    pub fallthrough: bool,
    /// Serve `index.html` for directory requests.
    pub index: bool,
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self {
            fallthrough: true,
            index: true,
        }
    }
}

/// Handler serving files from `dir` for GET/HEAD requests under `mount`.
pub fn static_files(mount: Option<&str>, dir: impl AsRef<Path>, options: StaticOptions) -> BoxedHandler {
    let prefix = mount
        .map(|m| m.trim_end_matches('/').to_string())
        .unwrap_or_default();
    let mount = mount.map(MountPath::new);
    let service = ServeDir::new(dir.as_ref()).append_index_html_on_directories(options.index);

    Arc::new(move |req: Request<Body>, next: Next| {
        let service = service.clone();
        let mount = mount.clone();
        let prefix = prefix.clone();
        let fallthrough = options.fallthrough;

        async move {
            if req.method() != Method::GET && req.method() != Method::HEAD {
                return next.run(req).await;
            }

            let relative = match &mount {
                Some(mount) => match mount.strip(req.uri().path()) {
                    Some(relative) => relative,
                    None => return next.run(req).await,
                },
                None => req.uri().path().to_string(),
            };
            let uri = match req.uri().query() {
                Some(query) => format!("{relative}?{query}"),
                None => relative,
            };

            let mut builder = Request::builder()
                .method(req.method().clone())
                .uri(uri)
                .version(req.version());
            if let Some(headers) = builder.headers_mut() {
                headers.extend(req.headers().clone());
            }
            let Ok(file_request) = builder.body(Body::empty()) else {
                return next.run(req).await;
            };

            let mut response: Response = match service.oneshot(file_request).await {
                Ok(response) => response.map(Body::new),
                Err(never) => match never {},
            };

            if response.status() == StatusCode::NOT_FOUND && fallthrough {
                return next.run(req).await;
            }

            // Directory redirects point below the stripped prefix; put it back.
            if response.status().is_redirection() && !prefix.is_empty() {
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|l| l.to_str().ok())
                    .map(|l| format!("{prefix}{l}"));
                if let Some(value) = location.and_then(|l| HeaderValue::from_str(&l).ok()) {
                    response.headers_mut().insert(header::LOCATION, value);
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

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log('app');").unwrap();
        dir
    }

    fn table(dir: &Path, options: StaticOptions) -> RouteTable {
        let table = RouteTable::new();
        table.add_middleware(Some("/assets"), static_files(Some("/assets"), dir, options));
        table.add_route(RouteEntry::new(
            ["/assets/*"],
            RouteMethod::Get,
            Arc::new(|_req: Request<Body>, _next: Next| async { "fallback".into_response() }),
        ));
        table
    }

    async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8_lossy(&bytes).to_string()
    }

    #[tokio::test]
    async fn serves_files_below_mount() {
        let dir = fixture();
        let table = table(dir.path(), StaticOptions::default());
        let response = table
            .dispatch(Request::get("/assets/app.js").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "console.log('app');");
    }

    #[tokio::test]
    async fn misses_fall_through() {
        let dir = fixture();
        let table = table(dir.path(), StaticOptions::default());
        let response = table
            .dispatch(Request::get("/assets/missing.js").body(Body::empty()).unwrap())
            .await;
        assert_eq!(text(response).await, "fallback");
    }

    #[tokio::test]
    async fn misses_stop_without_fallthrough() {
        let dir = fixture();
        let options = StaticOptions {
            fallthrough: false,
            ..StaticOptions::default()
        };
        let table = table(dir.path(), options);
        let response = table
            .dispatch(Request::get("/assets/missing.js").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_methods_pass_through() {
        let dir = fixture();
        let table = table(dir.path(), StaticOptions::default());
        let response = table
            .dispatch(
                Request::post("/assets/app.js")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
