//! Transport negotiation and listener startup.
//!
//! # Responsibilities
//! - Pick plain, TLS or multiplexed transport from protocol options
//! - Bind the socket and hand it to axum-server
//! - Apply the global request timeout
//! - Keep a handle for shutdown
//!
//! # Negotiation
//! ```text
//! multiplexed protocol requested + cert/key → Multiplexed (h2 over TLS)
//! cert/key                                  → Tls (HTTP/1.1 over TLS)
//! otherwise                                 → Plain
//! ```
//! Missing credentials are not an error: the choice falls through.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use axum_server::Handle;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::timeout::TimeoutLayer;

use crate::config::ProtocolOptions;
use crate::net::tls::{load_tls_config, ALPN_HTTP1, ALPN_MULTIPLEXED};

/// Request timeout applied to every accepted connection.
pub const LISTENER_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP/2 stream and connection flow-control window.
pub const H2_WINDOW_SIZE: u32 = 1024 * 1024;

/// Grace period for in-flight requests on close.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("TLS configuration error: {0}")]
    Tls(String),
    #[error("Listener already active")]
    AlreadyListening,
    #[error("Listener failed: {0}")]
    Serve(#[from] std::io::Error),
}

/// Negotiated transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Multiplexed,
    Tls,
    Plain,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Multiplexed => write!(f, "h2+tls"),
            Transport::Tls => write!(f, "tls"),
            Transport::Plain => write!(f, "plain"),
        }
    }
}

/// Pick the transport for `options`; see the module docs for the table.
pub fn negotiate(options: Option<&ProtocolOptions>) -> Transport {
    let Some(options) = options else {
        return Transport::Plain;
    };
    match (options.wants_multiplexing(), options.credentials().is_some()) {
        (true, true) => Transport::Multiplexed,
        (_, true) => Transport::Tls,
        _ => Transport::Plain,
    }
}

/// Wildcard when `bind_all`, loopback otherwise.
pub fn bind_address(port: u16, bind_all: bool) -> SocketAddr {
    let ip = if bind_all {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    };
    SocketAddr::new(ip, port)
}

/// A bound, serving listener.
pub struct Listening {
    pub addr: SocketAddr,
    pub transport: Transport,
    handle: Handle,
    task: JoinHandle<std::io::Result<()>>,
}

impl Listening {
    /// Stop accepting, give in-flight requests a grace period, wait for exit.
    pub async fn shutdown(self) -> Result<(), TransportError> {
        self.handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        match self.task.await {
            Ok(result) => result.map_err(TransportError::from),
            Err(e) => Err(TransportError::Serve(std::io::Error::other(e))),
        }
    }
}

/// Answer 408 for requests still running after `timeout`.
fn with_request_timeout(app: Router, timeout: Duration) -> Router {
    app.layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
}

/// Bind `addr` and serve `app` over the negotiated transport.
pub async fn start(
    addr: SocketAddr,
    transport: Transport,
    options: Option<&ProtocolOptions>,
    app: Router,
) -> Result<Listening, TransportError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| TransportError::Bind { addr, source })?;
    let listener = listener
        .into_std()
        .map_err(|source| TransportError::Bind { addr, source })?;

    let service = with_request_timeout(app, LISTENER_TIMEOUT).into_make_service();
    let handle = Handle::new();

    let credentials = options.and_then(|o| o.credentials());
    let passphrase = options.and_then(|o| o.passphrase.as_deref());

    let task = match (transport, credentials) {
        (Transport::Multiplexed, Some((cert, key))) => {
            let tls = load_tls_config(cert, key, passphrase, ALPN_MULTIPLEXED)?;
            let mut server = axum_server::from_tcp_rustls(listener, tls).handle(handle.clone());
            server
                .http_builder()
                .http2()
                .initial_stream_window_size(H2_WINDOW_SIZE)
                .initial_connection_window_size(H2_WINDOW_SIZE)
                .adaptive_window(false);
            tokio::spawn(server.serve(service))
        }
        (Transport::Tls, Some((cert, key))) => {
            let tls = load_tls_config(cert, key, passphrase, ALPN_HTTP1)?;
            let server = axum_server::from_tcp_rustls(listener, tls).handle(handle.clone());
            tokio::spawn(server.serve(service))
        }
        _ => {
            let server = axum_server::from_tcp(listener).handle(handle.clone());
            tokio::spawn(server.serve(service))
        }
    };

    tracing::info!(
        address = %local_addr,
        transport = %transport,
        timeout_secs = LISTENER_TIMEOUT.as_secs(),
        "Listener bound"
    );

    Ok(Listening {
        addr: local_addr,
        transport,
        handle,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;

    fn options(protocols: &[Protocol], credentials: bool) -> ProtocolOptions {
        ProtocolOptions {
            cert: credentials.then(|| "cert".to_string()),
            key: credentials.then(|| "key".to_string()),
            protocols: protocols.to_vec(),
            ..ProtocolOptions::default()
        }
    }

    #[test]
    fn multiplexed_protocols_win_with_credentials() {
        for protocol in [Protocol::H2, Protocol::Spdy31, Protocol::Spdy3, Protocol::Spdy2] {
            let opts = options(&[Protocol::Http11, protocol], true);
            assert_eq!(negotiate(Some(&opts)), Transport::Multiplexed);
        }
    }

    #[test]
    fn credentials_alone_select_tls() {
        assert_eq!(negotiate(Some(&options(&[], true))), Transport::Tls);
        assert_eq!(
            negotiate(Some(&options(&[Protocol::Http11, Protocol::Tls], true))),
            Transport::Tls
        );
    }

    #[test]
    fn missing_credentials_fall_through_to_plain() {
        assert_eq!(negotiate(None), Transport::Plain);
        assert_eq!(negotiate(Some(&options(&[Protocol::H2], false))), Transport::Plain);
        assert_eq!(negotiate(Some(&options(&[Protocol::Http11], false))), Transport::Plain);

        let half = ProtocolOptions {
            cert: Some("cert".into()),
            protocols: vec![Protocol::H2],
            ..ProtocolOptions::default()
        };
        assert_eq!(negotiate(Some(&half)), Transport::Plain);
    }

    #[test]
    fn bind_address_follows_flag() {
        assert_eq!(bind_address(80, true).to_string(), "0.0.0.0:80");
        assert_eq!(bind_address(80, false).to_string(), "127.0.0.1:80");
    }

    #[tokio::test]
    async fn slow_requests_time_out_with_408() {
        use axum::body::Body;
        use axum::http::Request;
        use axum::routing::get;
        use tower::ServiceExt;

        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let res = with_request_timeout(app, Duration::from_millis(20))
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        let result = start(addr, Transport::Plain, None, Router::new()).await;
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[tokio::test]
    async fn bad_credentials_fail_before_serving() {
        let opts = options(&[Protocol::H2], true);
        let result = start(
            bind_address(0, false),
            negotiate(Some(&opts)),
            Some(&opts),
            Router::new(),
        )
        .await;
        assert!(matches!(result, Err(TransportError::Tls(_))));
    }
}
