//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (pages reference existing gateways)
//! - Validate value ranges (poll intervals > 0, paths absolute)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: StorefrontConfig → Result<(), Vec<ValidationError>>
//! - A multiplexed protocol without credentials is only warned about; the
//!   listener falls through to the next transport instead

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::StorefrontConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate gateway name '{0}'")]
    DuplicateGateway(String),
    #[error("duplicate page name '{0}'")]
    DuplicatePage(String),
    #[error("page '{page}' references unknown gateway '{gateway}'")]
    UnknownGateway { page: String, gateway: String },
    #[error("page '{0}' has no urls")]
    EmptyUrls(String),
    #[error("path '{0}' must start with '/'")]
    RelativePath(String),
    #[error("gateway '{0}' has a zero poll interval")]
    ZeroInterval(String),
    #[error("gateway '{0}' has a zero request timeout")]
    ZeroTimeout(String),
}

/// Check a loaded config, collecting every problem instead of stopping at the first.
pub fn validate_config(config: &StorefrontConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut gateway_names = HashSet::new();
    for gateway in &config.gateways {
        if !gateway_names.insert(gateway.name.as_str()) {
            errors.push(ValidationError::DuplicateGateway(gateway.name.clone()));
        }
        if gateway.interval_ms == 0 {
            errors.push(ValidationError::ZeroInterval(gateway.name.clone()));
        }
        if gateway.timeout_ms == 0 {
            errors.push(ValidationError::ZeroTimeout(gateway.name.clone()));
        }
    }

    let mut page_names = HashSet::new();
    for page in &config.pages {
        if !page_names.insert(page.name.as_str()) {
            errors.push(ValidationError::DuplicatePage(page.name.clone()));
        }
        if page.urls.is_empty() {
            errors.push(ValidationError::EmptyUrls(page.name.clone()));
        }
        for url in &page.urls {
            if !url.starts_with('/') {
                errors.push(ValidationError::RelativePath(url.clone()));
            }
        }
        for gateway in &page.gateways {
            if !gateway_names.contains(gateway.as_str()) {
                errors.push(ValidationError::UnknownGateway {
                    page: page.name.clone(),
                    gateway: gateway.clone(),
                });
            }
        }
    }

    for path in &config.healthcheck_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::RelativePath(path.clone()));
        }
    }

    if let Some(options) = &config.server.protocol {
        let has_credentials = options.cert.is_some() || options.cert_path.is_some();
        if options.wants_multiplexing() && !has_credentials {
            tracing::warn!(
                protocols = ?options.protocols,
                "Multiplexed protocol requested without certificate; listener will fall back"
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
