//! Concurrent model bootstrap
//!
//! Brings every registry slot to a terminal state as fast as possible:
//! - One spawned task per slot, all started together (no ordering)
//! - A failing or panicking loader only fails its own slot
//! - Completion is reported after every task resolves; nothing is retried

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::pipeline::{Pipeline, PipelineError, PipelineLoader, SerializedPipeline};
use crate::registry::{ModelRegistry, SlotState};
use crate::types::{Category, PipelineSpec};

/// Outcome of one bootstrap run
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub ready: Vec<Category>,
    pub failed: Vec<(Category, String)>,
    pub elapsed: Duration,
}

impl BootstrapReport {
    pub fn all_ready(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Loads every slot of a registry
pub struct Bootstrapper {
    registry: Arc<ModelRegistry>,
    loader: Arc<dyn PipelineLoader>,
    load_timeout: Option<Duration>,
}

impl Bootstrapper {
    pub fn new(registry: Arc<ModelRegistry>, loader: Arc<dyn PipelineLoader>) -> Self {
        Self {
            registry,
            loader,
            load_timeout: None,
        }
    }

    /// Fail a slot whose load takes longer than `timeout`
    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Run bootstrap in the background
    pub fn spawn(self) -> JoinHandle<BootstrapReport> {
        tokio::spawn(self.run())
    }

    /// Load every slot concurrently and wait for all of them to settle
    pub async fn run(self) -> BootstrapReport {
        let started = Instant::now();
        let specs: Vec<PipelineSpec> = self.registry.specs().cloned().collect();
        info!(slots = specs.len(), "Starting model bootstrap");

        let units: Vec<(Category, JoinHandle<()>)> = specs
            .into_iter()
            .map(|spec| {
                let category = spec.category;
                let registry = Arc::clone(&self.registry);
                let loader = Arc::clone(&self.loader);
                let timeout = self.load_timeout;
                (category, tokio::spawn(load_slot(registry, loader, spec, timeout)))
            })
            .collect();

        let (categories, handles): (Vec<_>, Vec<_>) = units.into_iter().unzip();
        let outcomes = join_all(handles).await;

        for (category, outcome) in categories.into_iter().zip(outcomes) {
            if let Err(join_error) = outcome {
                let reason = if join_error.is_panic() {
                    "pipeline loader panicked".to_string()
                } else {
                    format!("load task aborted: {}", join_error)
                };
                error!(category = %category, error = %reason, "Model load task did not complete");
                if let Err(e) = self
                    .registry
                    .transition(category, SlotState::Failed(reason))
                {
                    error!(category = %category, error = %e, "Failed to record load failure");
                }
            }
        }

        let snapshot = self.registry.snapshot();
        let mut report = BootstrapReport {
            ready: snapshot.ready_categories(),
            failed: Vec::new(),
            elapsed: started.elapsed(),
        };
        for (category, slot) in &snapshot.slots {
            if let Some(e) = slot.error() {
                report.failed.push((*category, e.to_string()));
            }
        }

        if report.all_ready() {
            info!(
                ready = report.ready.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "✓ All models loaded"
            );
        } else {
            warn!(
                ready = report.ready.len(),
                failed = report.failed.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Model bootstrap finished with unavailable models"
            );
        }
        report
    }
}

/// One bootstrap unit: Loading → Ready | Failed
async fn load_slot(
    registry: Arc<ModelRegistry>,
    loader: Arc<dyn PipelineLoader>,
    spec: PipelineSpec,
    timeout: Option<Duration>,
) {
    let category = spec.category;
    if let Err(e) = registry.transition(category, SlotState::Loading) {
        error!(category = %category, error = %e, "Slot cannot start loading");
        return;
    }
    info!(category = %category, model = %spec.model_id, task = %spec.task, "Loading model");

    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, loader.load(&spec))
            .await
            .unwrap_or(Err(PipelineError::Timeout)),
        None => loader.load(&spec).await,
    };

    let next = match result {
        Ok(handle) => {
            let handle: Arc<dyn Pipeline> = if spec.serialize_invocations {
                Arc::new(SerializedPipeline::new(handle))
            } else {
                handle
            };
            info!(
                category = %category,
                model = %spec.model_id,
                serialized = spec.serialize_invocations,
                "✓ Model ready"
            );
            SlotState::Ready(handle)
        }
        Err(e) => {
            warn!(category = %category, model = %spec.model_id, error = %e, "Model failed to load");
            SlotState::Failed(e.to_string())
        }
    };

    if let Err(e) = registry.transition(category, next) {
        error!(category = %category, error = %e, "Failed to publish slot state");
    }
}
