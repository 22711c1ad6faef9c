//! Readiness and service metadata endpoints

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::registry::{RegistrySnapshot, SlotStatus};
use crate::types::{Category, TaskKind};
use crate::AppState;

/// Per-slot status entry
#[derive(Debug, Serialize)]
pub struct SlotReport {
    pub state: SlotStatus,
    pub model: String,
    pub task: TaskKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the slot last changed state
    pub changed_at: DateTime<Utc>,
}

/// GET /text/models/status response
#[derive(Debug, Serialize)]
pub struct ModelsStatus {
    /// Bootstrap finished (some models may have failed)
    pub models_loaded: bool,
    pub models: BTreeMap<Category, SlotReport>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl From<&RegistrySnapshot> for ModelsStatus {
    fn from(snapshot: &RegistrySnapshot) -> Self {
        let models = snapshot
            .slots
            .iter()
            .map(|(category, slot)| {
                (
                    *category,
                    SlotReport {
                        state: slot.state.status(),
                        model: slot.spec.model_id.clone(),
                        task: slot.spec.task,
                        error: slot.error().map(str::to_string),
                        changed_at: slot.changed_at,
                    },
                )
            })
            .collect();

        Self {
            models_loaded: snapshot.overall_ready(),
            models,
            loaded_at: snapshot.settled_at,
        }
    }
}

/// GET /text/service/info response
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub module: String,
    pub version: String,
    pub available_models: Vec<Category>,
    pub unavailable_models: Vec<Category>,
    pub model_details: BTreeMap<Category, String>,
    pub max_text_length: usize,
    pub request_timeout_ms: u64,
    pub status: ModelsStatus,
}

/// GET /text/models/status
pub async fn models_status(State(state): State<AppState>) -> Json<ModelsStatus> {
    Json(ModelsStatus::from(&state.registry.snapshot()))
}

/// GET /text/service/info
pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    let snapshot = state.registry.snapshot();
    let limits = state.orchestrator.limits();

    Json(ServiceInfo {
        module: "textsense-ta".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        available_models: snapshot.ready_categories(),
        unavailable_models: snapshot.unready_categories(),
        model_details: snapshot
            .slots
            .iter()
            .map(|(category, slot)| (*category, slot.spec.model_id.clone()))
            .collect(),
        max_text_length: limits.max_text_length,
        request_timeout_ms: limits.request_timeout.as_millis() as u64,
        status: ModelsStatus::from(&snapshot),
    })
}
