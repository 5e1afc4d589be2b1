//! HTML template pages.
//!
//! The template is read on compile. Each `{{gateway}}` placeholder is replaced
//! with that gateway's latest content when the page is rendered.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use futures_util::future::BoxFuture;

use crate::config::PageConfig;
use crate::gateway::Gateway;
use crate::page::{build_condition, Page, PageError};
use crate::routing::matcher::Matcher;
use crate::routing::Next;

pub struct TemplatePage {
    config: PageConfig,
    gateways: Vec<Arc<dyn Gateway>>,
    condition: Option<Box<dyn Matcher>>,
    template: ArcSwapOption<String>,
}

impl TemplatePage {
    /// Uncompiled page; the template is read on first `compile`.
    pub fn new(config: PageConfig, gateways: Vec<Arc<dyn Gateway>>) -> Self {
        let condition = config.condition.as_ref().and_then(build_condition);
        Self {
            config,
            gateways,
            condition,
            template: ArcSwapOption::empty(),
        }
    }

    /// Whether a compiled template is loaded.
    pub fn is_compiled(&self) -> bool {
        self.template.load().is_some()
    }

    fn render(&self) -> Response {
        let Some(template) = self.template.load_full() else {
            tracing::warn!(page = %self.config.name, "Page requested before compile");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        };

        let html = self.gateways.iter().fold(template.to_string(), |html, gateway| {
            let placeholder = format!("{{{{{}}}}}", gateway.name());
            let content = gateway.content();
            html.replace(&placeholder, content.as_deref().map(String::as_str).unwrap_or_default())
        });
        Html(html).into_response()
    }
}

impl Page for TemplatePage {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn urls(&self) -> &[String] {
        &self.config.urls
    }

    fn condition(&self) -> Option<&dyn Matcher> {
        self.condition.as_deref()
    }

    fn compile(&self) -> BoxFuture<'_, Result<(), PageError>> {
        Box::pin(async move {
            let source = tokio::fs::read_to_string(&self.config.html)
                .await
                .map_err(|source| PageError::Template {
                    path: self.config.html.clone(),
                    source,
                })?;
            self.template.store(Some(Arc::new(source)));
            tracing::debug!(page = %self.config.name, template = %self.config.html, "Page compiled");
            Ok(())
        })
    }

    fn handle(&self, _req: Request<Body>) -> BoxFuture<'_, Response> {
        Box::pin(async move { self.render() })
    }

    fn post(&self, _req: Request<Body>, _next: Next) -> BoxFuture<'_, Response> {
        Box::pin(async move { self.render() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;
    use tokio::task::JoinHandle;

    use crate::gateway::ReadySignal;

    struct Fixed(&'static str, &'static str);

    impl Gateway for Fixed {
        fn name(&self) -> &str {
            self.0
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn content(&self) -> Option<Arc<String>> {
            Some(Arc::new(self.1.to_string()))
        }
        fn start_polling(self: Arc<Self>, ready: ReadySignal, _: broadcast::Receiver<()>) -> JoinHandle<()> {
            tokio::spawn(async move {
                ready.fire();
            })
        }
    }

    fn page(html: &str) -> TemplatePage {
        TemplatePage::new(
            PageConfig {
                name: "home".into(),
                html: html.into(),
                urls: vec!["/home".into()],
                gateways: vec!["header".into()],
                condition: None,
            },
            vec![Arc::new(Fixed("header", "<nav>menu</nav>"))],
        )
    }

    async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8_lossy(&bytes).to_string()
    }

    #[tokio::test]
    async fn renders_gateway_content_into_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("home.html");
        std::fs::write(&path, "<body>{{header}}<main>{{missing}}</main></body>").unwrap();

        let page = page(path.to_str().unwrap());
        page.compile().await.unwrap();
        assert!(page.is_compiled());

        let response = page
            .handle(Request::get("/home").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            text(response).await,
            "<body><nav>menu</nav><main>{{missing}}</main></body>"
        );
    }

    #[tokio::test]
    async fn uncompiled_page_is_unavailable() {
        let page = page("/nonexistent/home.html");
        let response = page
            .handle(Request::get("/home").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn missing_template_fails_compile() {
        let page = page("/nonexistent/home.html");
        let err = page.compile().await.unwrap_err();
        assert!(matches!(err, PageError::Template { .. }));
    }
}
