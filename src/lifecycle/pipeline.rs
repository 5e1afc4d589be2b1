//! Bootstrap pipeline.
//!
//! Stages run strictly in `Stage::ORDER`. The first failing stage stops the
//! pipeline; its error is wrapped with the stage name and nothing after it runs.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use thiserror::Error;
use tracing::Instrument;

use crate::config::{ConfigError, StorefrontConfig};
use crate::dependency::{DependencyDescriptor, DependencyRegistry};
use crate::gateway::{GatewayError, ReadinessBarrier, ReadinessTimeout};
use crate::http::handlers::{self, DEBUG_SCRIPT_PATH};
use crate::http::TransportServer;
use crate::net::TransportError;
use crate::observability::metrics;
use crate::page::{self, Page, PageError};
use crate::routing::RouteMethod;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("gateways not ready: {0}")]
    ReadinessTimeout(#[from] ReadinessTimeout),
    #[error("page '{page}' failed to compile: {source}")]
    PageWarmup {
        page: String,
        #[source]
        source: PageError,
    },
    #[error("page warm-up timed out after {0:?}")]
    WarmupTimeout(Duration),
    #[error("gateway '{name}' could not be created: {source}")]
    Gateway {
        name: String,
        #[source]
        source: GatewayError,
    },
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },
    #[error("bootstrap stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<BootstrapError>,
    },
    #[error("bootstrap has not completed")]
    Incomplete,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BootstrapError {
    /// Name of the failed stage, for stage failures.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            BootstrapError::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    RegisterDependencies,
    AwaitGateways,
    DebugRoute,
    CustomHeaders,
    HealthChecks,
    WarmPages,
    PageRoutes,
}

impl Stage {
    pub const ORDER: [Stage; 7] = [
        Stage::RegisterDependencies,
        Stage::AwaitGateways,
        Stage::DebugRoute,
        Stage::CustomHeaders,
        Stage::HealthChecks,
        Stage::WarmPages,
        Stage::PageRoutes,
    ];

    /// Stable name used in logs, metrics and stage errors.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::RegisterDependencies => "register_dependencies",
            Stage::AwaitGateways => "await_gateways",
            Stage::DebugRoute => "debug_route",
            Stage::CustomHeaders => "custom_headers",
            Stage::HealthChecks => "health_checks",
            Stage::WarmPages => "warm_pages",
            Stage::PageRoutes => "page_routes",
        }
    }
}

/// What the stages operate on, borrowed from the Storefront.
pub(crate) struct StageContext<'a> {
    pub config: &'a StorefrontConfig,
    pub server: &'a TransportServer,
    pub pages: &'a [Arc<dyn Page>],
    pub registry: &'a dyn DependencyRegistry,
    pub barrier: &'a ReadinessBarrier,
}

/// Run every stage in order, recording each one that completes.
pub(crate) async fn run(ctx: &StageContext<'_>, completed: &Mutex<Vec<Stage>>) -> Result<(), BootstrapError> {
    for (index, stage) in Stage::ORDER.into_iter().enumerate() {
        let span = tracing::info_span!("bootstrap_stage", stage = stage.name(), index);
        let started = Instant::now();

        run_stage(stage, ctx)
            .instrument(span)
            .await
            .map_err(|source| {
                tracing::error!(stage = stage.name(), error = %source, "Bootstrap stage failed");
                BootstrapError::Stage {
                    stage: stage.name(),
                    source: Box::new(source),
                }
            })?;

        let elapsed = started.elapsed();
        metrics::record_stage(stage.name(), elapsed);
        tracing::info!(stage = stage.name(), elapsed_ms = elapsed.as_millis() as u64, "Bootstrap stage complete");
        completed.lock().unwrap_or_else(PoisonError::into_inner).push(stage);
    }
    Ok(())
}

async fn run_stage(stage: Stage, ctx: &StageContext<'_>) -> Result<(), BootstrapError> {
    match stage {
        Stage::RegisterDependencies => {
            for dependency in &ctx.config.dependencies {
                ctx.registry.register(&DependencyDescriptor::from(dependency));
            }
            Ok(())
        }
        Stage::AwaitGateways => {
            let timeout = ctx.config.bootstrap.readiness_timeout_secs.map(Duration::from_secs);
            tracing::info!(gateways = ctx.barrier.target(), ?timeout, "Waiting for gateways");
            ctx.barrier.wait_until_all_ready(timeout).await?;
            Ok(())
        }
        Stage::DebugRoute => {
            ctx.server
                .add_route([DEBUG_SCRIPT_PATH], RouteMethod::Get, handlers::debug_script(), Vec::new());
            Ok(())
        }
        Stage::CustomHeaders => {
            ctx.server.add_custom_headers(&ctx.config.custom_headers);
            Ok(())
        }
        Stage::HealthChecks => {
            for path in &ctx.config.healthcheck_paths {
                ctx.server
                    .add_route([path.as_str()], RouteMethod::Get, handlers::health_check(), Vec::new());
            }
            Ok(())
        }
        Stage::WarmPages => {
            let timeout = ctx.config.bootstrap.warmup_timeout_secs.map(Duration::from_secs);
            warm_pages(ctx.pages, timeout).await
        }
        Stage::PageRoutes => {
            for page in ctx.pages {
                let urls = page.urls().to_vec();
                ctx.server
                    .add_route(urls.clone(), RouteMethod::Get, page::get_handler(Arc::clone(page)), Vec::new());
                ctx.server
                    .add_route(urls, RouteMethod::Post, page::post_handler(Arc::clone(page)), Vec::new());
            }
            Ok(())
        }
    }
}

/// Compile every page concurrently; completes when all have finished.
async fn warm_pages(pages: &[Arc<dyn Page>], timeout: Option<Duration>) -> Result<(), BootstrapError> {
    let warmups = join_all(pages.iter().map(|page| async move {
        (page.name().to_string(), page.compile().await)
    }));

    let results = match timeout {
        Some(limit) => tokio::time::timeout(limit, warmups)
            .await
            .map_err(|_| BootstrapError::WarmupTimeout(limit))?,
        None => warmups.await,
    };

    for (page, result) in results {
        result.map_err(|source| BootstrapError::PageWarmup { page, source })?;
    }
    Ok(())
}
