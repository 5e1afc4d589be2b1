//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the storefront.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the storefront.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorefrontConfig {
    /// Listener configuration (port, interfaces, protocol negotiation).
    pub server: ServerConfig,

    /// Headers set on every response.
    pub custom_headers: Vec<CustomHeader>,

    /// Paths answering `200` with an empty body.
    pub healthcheck_paths: Vec<String>,

    /// Upstream fragment providers.
    pub gateways: Vec<GatewayConfig>,

    /// Pages bound to URLs.
    pub pages: Vec<PageConfig>,

    /// Externally supplied dependencies registered during bootstrap.
    pub dependencies: Vec<DependencyConfig>,

    /// Bootstrap wait limits.
    pub bootstrap: BootstrapConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security hardening.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port for the negotiated listener (0 picks an ephemeral port).
    pub port: u16,

    /// Bind to the wildcard address instead of loopback.
    pub bind_all_interfaces: bool,

    /// Optional protocol negotiation material.
    pub protocol: Option<ProtocolOptions>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_all_interfaces: false,
            protocol: None,
        }
    }
}

/// Transport protocol identifiers accepted in `protocols`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Protocol {
    #[serde(rename = "http/1.1")]
    Http11,
    #[serde(rename = "https")]
    Tls,
    #[serde(rename = "h2")]
    H2,
    #[serde(rename = "spdy/3.1")]
    Spdy31,
    #[serde(rename = "spdy/3")]
    Spdy3,
    #[serde(rename = "spdy/2")]
    Spdy2,
}

impl Protocol {
    /// True for protocols carrying several streams over one connection.
    pub fn is_multiplexed(&self) -> bool {
        matches!(self, Protocol::H2 | Protocol::Spdy31 | Protocol::Spdy3 | Protocol::Spdy2)
    }
}

/// Certificate material and supported protocols.
///
/// `cert`/`key` hold PEM text. `cert_path`/`key_path` are read into them by the
/// loader, so by the time the server sees the options only the inline fields matter.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolOptions {
    pub cert: Option<String>,
    pub key: Option<String>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    pub passphrase: Option<String>,
    /// Ordered protocol preference.
    pub protocols: Vec<Protocol>,
}

impl ProtocolOptions {
    /// Whether any requested protocol is multiplexed.
    pub fn wants_multiplexing(&self) -> bool {
        self.protocols.iter().any(Protocol::is_multiplexed)
    }

    /// Certificate and key, when both are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.cert.as_deref(), self.key.as_deref()) {
            (Some(cert), Some(key)) => Some((cert, key)),
            _ => None,
        }
    }
}

/// A header applied to every response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CustomHeader {
    pub key: String,
    pub value: String,
    /// Treat `value` as an environment variable name.
    #[serde(default)]
    pub env: bool,
}

impl CustomHeader {
    /// The value to emit: the environment variable's content when `env` is set
    /// and the variable exists, otherwise the literal value.
    pub fn resolve(&self) -> String {
        if self.env {
            if let Ok(from_env) = std::env::var(&self.value) {
                return from_env;
            }
        }
        self.value.clone()
    }
}

/// Upstream fragment provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Unique gateway name.
    pub name: String,

    /// URL polled for fresh content (plain HTTP).
    pub url: String,

    /// Poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Per-poll request timeout in milliseconds.
    #[serde(default = "default_poll_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_poll_timeout_ms() -> u64 {
    5_000
}

/// Page definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PageConfig {
    /// Unique page name.
    pub name: String,

    /// Path to the HTML template.
    pub html: String,

    /// URL patterns the page answers on.
    pub urls: Vec<String>,

    /// Gateways whose fragments the template references.
    #[serde(default)]
    pub gateways: Vec<String>,

    /// Optional request condition gating the GET handler.
    #[serde(default)]
    pub condition: Option<ConditionConfig>,
}

/// Declarative routing condition. Every present clause must hold.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConditionConfig {
    pub header: Option<NameValue>,
    pub cookie: Option<NameValue>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

/// Dependency registered during bootstrap.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencyConfig {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Bounds on bootstrap waits. `None` waits forever.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub readiness_timeout_secs: Option<u64>,
    pub warmup_timeout_secs: Option<u64>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Structured access logging in the default middleware stack.
    pub access_log: bool,

    /// Prometheus scrape endpoint.
    pub metrics_enabled: bool,
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            access_log: true,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub headers: bool,
    /// Maximum parsed body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            headers: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
