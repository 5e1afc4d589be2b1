//! Built-in handlers registered during bootstrap.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::IntoResponse;

use crate::routing::{BoxedHandler, Next};

/// Path of the debug helper script.
pub const DEBUG_SCRIPT_PATH: &str = "/__storefront/debug.js";

pub const DEBUG_CONTENT_TYPE: &str = "application/javascript";

/// Client-side helper listing the fragments rendered into the page.
pub const DEBUG_SCRIPT: &str = r#"(function () {
  var fragments = document.querySelectorAll('[data-fragment]');
  var names = Array.prototype.map.call(fragments, function (node) {
    return node.getAttribute('data-fragment');
  });
  console.info('[storefront] fragments on page:', names);
  window.__storefront = { fragments: names };
})();
"#;

/// `200` with an empty body.
pub fn health_check() -> BoxedHandler {
    Arc::new(|_req: Request<Body>, _next: Next| async { StatusCode::OK.into_response() })
}

/// Serves the client-side debug script.
pub fn debug_script() -> BoxedHandler {
    Arc::new(|_req: Request<Body>, _next: Next| async {
        ([(header::CONTENT_TYPE, DEBUG_CONTENT_TYPE)], DEBUG_SCRIPT).into_response()
    })
}
