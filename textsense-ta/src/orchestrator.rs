//! Analysis orchestration
//!
//! Fans a request out to every requested category whose slot is Ready, joins
//! on all invocations, and assembles one response.
//!
//! # Failure Isolation
//! - Slots not Ready are reported as `not_loaded` without invoking anything
//! - A pipeline error, panic, or timeout only affects its own category
//!   (`execution_failed`); sibling invocations always run to completion
//! - The whole request fails only when bootstrap is incomplete or none of the
//!   requested categories has a Ready pipeline
//!
//! # Cancellation
//! All invocations of a request share one [`InvocationContext`]. The deadline
//! bounds every invocation independently, and dropping the request future
//! (client disconnect) cancels the context token and every in-flight call.

use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use textsense_common::config::AnalysisConfig;
use tracing::{debug, info, warn};

use crate::error::AnalysisError;
use crate::gate::{ReadinessGate, STILL_LOADING};
use crate::pipeline::{InvocationContext, Pipeline, PipelineError};
use crate::registry::{ModelRegistry, SlotState};
use crate::scoring::shape_output;
use crate::types::{AggregateResponse, Category, CategoryOutput, CategoryResult, TaskKind};

/// Request-time limits
#[derive(Debug, Clone, Copy)]
pub struct AnalysisLimits {
    /// Maximum text length in characters
    pub max_text_length: usize,
    /// Overall deadline for one request
    pub request_timeout: Duration,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        (&AnalysisConfig::default()).into()
    }
}

impl From<&AnalysisConfig> for AnalysisLimits {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            max_text_length: config.max_text_length,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }
}

/// Serves analysis requests over the registry
pub struct AnalysisOrchestrator {
    registry: Arc<ModelRegistry>,
    gate: ReadinessGate,
    limits: AnalysisLimits,
}

impl AnalysisOrchestrator {
    pub fn new(registry: Arc<ModelRegistry>, limits: AnalysisLimits) -> Self {
        Self {
            gate: ReadinessGate::new(Arc::clone(&registry)),
            registry,
            limits,
        }
    }

    pub fn limits(&self) -> AnalysisLimits {
        self.limits
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Reject empty, whitespace-only, or over-long text
    pub fn validate_text(&self, text: &str) -> Result<(), AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::InvalidInput("Text must not be empty".to_string()));
        }
        let length = text.chars().count();
        if length > self.limits.max_text_length {
            return Err(AnalysisError::InvalidInput(format!(
                "Text must not exceed {} characters (got {})",
                self.limits.max_text_length, length
            )));
        }
        Ok(())
    }

    /// Analyze every configured category
    pub async fn analyze_all(&self, text: &str) -> Result<AggregateResponse, AnalysisError> {
        let categories: BTreeSet<Category> = self.registry.categories().collect();
        self.analyze(text, &categories).await
    }

    /// Analyze the requested categories with the configured deadline
    pub async fn analyze(
        &self,
        text: &str,
        categories: &BTreeSet<Category>,
    ) -> Result<AggregateResponse, AnalysisError> {
        let ctx = InvocationContext::new(self.limits.request_timeout);
        self.analyze_with_context(text, categories, &ctx).await
    }

    /// Analyze the requested categories under a caller-supplied context
    pub async fn analyze_with_context(
        &self,
        text: &str,
        categories: &BTreeSet<Category>,
        ctx: &InvocationContext,
    ) -> Result<AggregateResponse, AnalysisError> {
        self.validate_text(text)?;
        if categories.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "At least one category must be requested".to_string(),
            ));
        }

        let snapshot = self.registry.snapshot();
        if !snapshot.overall_ready() {
            return Err(AnalysisError::ServiceUnavailable(STILL_LOADING.to_string()));
        }

        let mut analysis = BTreeMap::new();
        let mut invocations = Vec::new();
        for &category in categories {
            match snapshot.get(category).map(|slot| (&slot.state, slot.spec.task)) {
                Some((SlotState::Ready(handle), task)) => {
                    invocations.push((category, task, Arc::clone(handle)));
                }
                Some((SlotState::Failed(reason), _)) => {
                    analysis.insert(
                        category,
                        CategoryResult::not_loaded(format!(
                            "{} model is not available: {}",
                            category, reason
                        )),
                    );
                }
                Some(_) => {
                    analysis.insert(
                        category,
                        CategoryResult::not_loaded(format!("{} model is not loaded", category)),
                    );
                }
                None => {
                    analysis.insert(
                        category,
                        CategoryResult::not_loaded(format!("{} model is not configured", category)),
                    );
                }
            }
        }

        if invocations.is_empty() {
            return Err(AnalysisError::ServiceUnavailable(
                "None of the requested analysis models is available".to_string(),
            ));
        }

        // Cancels in-flight invocations if this future is dropped
        let _cancel_on_drop = ctx.cancel_token().clone().drop_guard();

        info!(
            request_id = %ctx.request_id(),
            categories = invocations.len(),
            chars = text.chars().count(),
            "Analyzing text"
        );

        let fan_out = invocations.into_iter().map(|(category, task, pipeline)| async move {
            let result = invoke_pipeline(category, task, pipeline, text, ctx).await;
            (category, result)
        });

        for (category, result) in join_all(fan_out).await {
            let entry = match result {
                Ok(output) => CategoryResult::Available(output),
                Err(e) => CategoryResult::execution_failed(format!(
                    "{} analysis failed: {}",
                    category, e
                )),
            };
            analysis.insert(category, entry);
        }

        let response = AggregateResponse {
            text: text.to_string(),
            analysis,
            timestamp: Utc::now(),
        };
        debug!(request_id = %ctx.request_id(), "Analysis complete");
        Ok(response)
    }

    /// Analyze one category; unavailability is an error rather than a placeholder
    pub async fn analyze_category(
        &self,
        text: &str,
        category: Category,
    ) -> Result<CategoryOutput, AnalysisError> {
        let ctx = InvocationContext::new(self.limits.request_timeout);
        self.analyze_category_with_context(text, category, &ctx).await
    }

    pub async fn analyze_category_with_context(
        &self,
        text: &str,
        category: Category,
        ctx: &InvocationContext,
    ) -> Result<CategoryOutput, AnalysisError> {
        self.validate_text(text)?;
        self.gate.require_ready(&[category])?;

        let slot = self.registry.get(category).ok_or_else(|| {
            AnalysisError::ServiceUnavailable(format!("{} model is not configured", category))
        })?;
        let pipeline = slot.pipeline().ok_or_else(|| {
            AnalysisError::ServiceUnavailable(format!("{} model is not loaded", category))
        })?;

        let _cancel_on_drop = ctx.cancel_token().clone().drop_guard();
        invoke_pipeline(category, slot.spec.task, pipeline, text, ctx)
            .await
            .map_err(|e| AnalysisError::ExecutionFailure {
                category,
                message: e.to_string(),
            })
    }
}

/// Invoke one pipeline under the request context and shape its output
async fn invoke_pipeline(
    category: Category,
    task: TaskKind,
    pipeline: Arc<dyn Pipeline>,
    text: &str,
    ctx: &InvocationContext,
) -> Result<CategoryOutput, PipelineError> {
    let call = AssertUnwindSafe(pipeline.invoke(text, ctx)).catch_unwind();

    let raw = tokio::select! {
        _ = ctx.cancel_token().cancelled() => Err(PipelineError::Cancelled),
        outcome = tokio::time::timeout_at(ctx.deadline(), call) => match outcome {
            Err(_) => Err(PipelineError::Timeout),
            Ok(Err(_panic)) => Err(PipelineError::Panicked),
            Ok(Ok(result)) => result,
        },
    };

    let shaped = raw.and_then(|raw| shape_output(task, raw));
    if let Err(e) = &shaped {
        warn!(
            request_id = %ctx.request_id(),
            category = %category,
            error = %e,
            "Pipeline invocation failed (per-category isolation)"
        );
    }
    shaped
}
