//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::{Html, IntoResponse, Response};
use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use rcgen::CertifiedKey;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use storefront::config::{StorefrontConfig, ServerConfig};
use storefront::gateway::{Gateway, ReadySignal};
use storefront::page::{Page, PageError};
use storefront::routing::{Matcher, Next};

pub const HEALTHCHECK_PATH: &str = "/__healthcheck";

/// Start a mock upstream answering every request with `body`.
pub async fn start_fragment_upstream(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Config listening on an ephemeral loopback port with one health check path.
pub fn base_config() -> StorefrontConfig {
    StorefrontConfig {
        server: ServerConfig {
            port: 0,
            ..ServerConfig::default()
        },
        healthcheck_paths: vec![HEALTHCHECK_PATH.to_string()],
        ..StorefrontConfig::default()
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Self-signed PEM certificate and key for `localhost`.
pub struct TestCert {
    pub cert_pem: String,
    pub key_pem: String,
    pub der: CertificateDer<'static>,
}

pub fn self_signed_localhost() -> TestCert {
    let CertifiedKey { cert, key_pair } = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    TestCert {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        der: cert.der().clone(),
    }
}

/// Open a TLS session to `addr` trusting only `cert`, offering `alpn`.
pub async fn tls_connect(addr: SocketAddr, cert: &TestCert, alpn: &[&[u8]]) -> TlsStream<TcpStream> {
    let mut roots = RootCertStore::empty();
    roots.add(cert.der.clone()).unwrap();

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();

    let tcp = TcpStream::connect(addr).await.unwrap();
    let name = ServerName::try_from("localhost").unwrap();
    TlsConnector::from(Arc::new(config)).connect(name, tcp).await.unwrap()
}

/// Gateway that reports ready only when the test says so.
pub struct ManualGateway {
    name: String,
    content: String,
    ready: AtomicBool,
    signal: Mutex<Option<ReadySignal>>,
}

impl ManualGateway {
    pub fn new(name: &str, content: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            content: content.to_string(),
            ready: AtomicBool::new(false),
            signal: Mutex::new(None),
        })
    }

    /// Fire the ready signal handed over by `start_polling`.
    pub fn fire(&self) -> bool {
        self.ready.store(true, Ordering::SeqCst);
        match self.signal.lock().unwrap().as_ref() {
            Some(signal) => signal.fire(),
            None => false,
        }
    }
}

impl Gateway for ManualGateway {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn content(&self) -> Option<Arc<String>> {
        Some(Arc::new(self.content.clone()))
    }

    fn start_polling(
        self: Arc<Self>,
        ready: ReadySignal,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        *self.signal.lock().unwrap() = Some(ready);
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
        })
    }
}

/// Page serving a fixed body, counting compiles.
pub struct StaticPage {
    name: String,
    urls: Vec<String>,
    body: String,
    fail_compile: bool,
    condition: Option<Box<dyn Matcher>>,
    pub compiles: AtomicUsize,
}

impl StaticPage {
    pub fn new(name: &str, url: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            urls: vec![url.to_string()],
            body: body.to_string(),
            fail_compile: false,
            condition: None,
            compiles: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_compile = true;
        self
    }

    pub fn with_condition(mut self, condition: impl Matcher + 'static) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }
}

impl Page for StaticPage {
    fn name(&self) -> &str {
        &self.name
    }

    fn urls(&self) -> &[String] {
        &self.urls
    }

    fn condition(&self) -> Option<&dyn Matcher> {
        self.condition.as_deref()
    }

    fn compile(&self) -> BoxFuture<'_, Result<(), PageError>> {
        Box::pin(async move {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            if self.fail_compile {
                return Err(PageError::Compile(format!("{} refused to compile", self.name)));
            }
            Ok(())
        })
    }

    fn handle(&self, _req: Request<Body>) -> BoxFuture<'_, Response> {
        Box::pin(async move { Html(self.body.clone()).into_response() })
    }

    fn post(&self, _req: Request<Body>, _next: Next) -> BoxFuture<'_, Response> {
        Box::pin(async move { format!("posted to {}", self.name).into_response() })
    }
}
