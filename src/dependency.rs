//! Externally supplied dependencies registered during bootstrap.

use std::sync::{Mutex, PoisonError};

use crate::config::DependencyConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
    pub name: String,
    pub version: Option<String>,
    pub url: Option<String>,
}

impl From<&DependencyConfig> for DependencyDescriptor {
    fn from(config: &DependencyConfig) -> Self {
        Self {
            name: config.name.clone(),
            version: config.version.clone(),
            url: config.url.clone(),
        }
    }
}

/// Receives dependency registrations. Registration cannot fail.
pub trait DependencyRegistry: Send + Sync {
    fn register(&self, dependency: &DependencyDescriptor);
}

/// In-memory registry keeping registrations in order.
#[derive(Debug, Default)]
pub struct DependencyCatalog {
    entries: Mutex<Vec<DependencyDescriptor>>,
}

impl DependencyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of registered dependencies, in registration order.
    pub fn registered(&self) -> Vec<DependencyDescriptor> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DependencyRegistry for DependencyCatalog {
    fn register(&self, dependency: &DependencyDescriptor) {
        tracing::info!(
            name = %dependency.name,
            version = dependency.version.as_deref().unwrap_or("unversioned"),
            "Dependency registered"
        );
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(dependency.clone());
    }
}
