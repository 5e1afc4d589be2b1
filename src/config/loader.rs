//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::StorefrontConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Relative credential paths resolve against the config file's directory.
pub fn load_config(path: &Path) -> Result<StorefrontConfig, ConfigError> {
    let content = read(path)?;
    let mut config = parse_config(&content)?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    resolve_credentials(&mut config, base)?;

    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<StorefrontConfig, ConfigError> {
    let config: StorefrontConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn resolve_credentials(config: &mut StorefrontConfig, base: &Path) -> Result<(), ConfigError> {
    let Some(options) = config.server.protocol.as_mut() else {
        return Ok(());
    };

    if options.cert.is_none() {
        if let Some(cert_path) = &options.cert_path {
            options.cert = Some(read(&base.join(cert_path))?);
        }
    }
    if options.key.is_none() {
        if let Some(key_path) = &options.key_path {
            options.key = Some(read(&base.join(key_path))?);
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
