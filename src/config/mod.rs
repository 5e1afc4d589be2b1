//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, read credential files)
//!     → validation.rs (semantic checks)
//!     → StorefrontConfig (validated, immutable)
//!     → owned by the Storefront for its whole life
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BootstrapConfig, ConditionConfig, CustomHeader, DependencyConfig, GatewayConfig, NameValue,
    ObservabilityConfig, PageConfig, Protocol, ProtocolOptions, SecurityConfig, ServerConfig,
    StorefrontConfig,
};
