//! Readiness gate for category-specific requests

use std::sync::Arc;

use crate::error::AnalysisError;
use crate::registry::{ModelRegistry, SlotState};
use crate::types::Category;

/// Message returned while bootstrap is still running
pub const STILL_LOADING: &str =
    "AI models are still loading. Please wait a few minutes and try again.";

/// Guard consulted before serving a request that needs specific categories
#[derive(Clone)]
pub struct ReadinessGate {
    registry: Arc<ModelRegistry>,
}

impl ReadinessGate {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn bootstrap_complete(&self) -> bool {
        self.registry.overall_ready()
    }

    /// Fail with `ServiceUnavailable` unless bootstrap is complete and every
    /// listed category is Ready
    pub fn require_ready(&self, categories: &[Category]) -> Result<(), AnalysisError> {
        if !self.bootstrap_complete() {
            return Err(AnalysisError::ServiceUnavailable(STILL_LOADING.to_string()));
        }

        for &category in categories {
            match self.registry.get(category).map(|slot| slot.state) {
                Some(SlotState::Ready(_)) => {}
                Some(SlotState::Failed(reason)) => {
                    return Err(AnalysisError::ServiceUnavailable(format!(
                        "{} model is not available: {}",
                        category, reason
                    )));
                }
                Some(_) => {
                    return Err(AnalysisError::ServiceUnavailable(format!(
                        "{} model is not loaded",
                        category
                    )));
                }
                None => {
                    return Err(AnalysisError::ServiceUnavailable(format!(
                        "{} model is not configured",
                        category
                    )));
                }
            }
        }
        Ok(())
    }
}
