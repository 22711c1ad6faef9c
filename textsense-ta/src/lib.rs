//! textsense-ta library interface
//!
//! Model lifecycle and analysis orchestration behind an authenticated HTTP
//! surface. Exposes public APIs for integration testing.

pub mod api;
pub mod bootstrap;
pub mod catalogue;
pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod scoring;
pub mod types;

pub use crate::error::{AnalysisError, ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use textsense_common::auth::Authenticator;
use tower_http::trace::TraceLayer;

use crate::orchestrator::AnalysisOrchestrator;
use crate::registry::ModelRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Request-time analysis over the registry
    pub orchestrator: Arc<AnalysisOrchestrator>,
    /// Readiness source of truth (read-only for handlers)
    pub registry: Arc<ModelRegistry>,
    /// Verifies bearer tokens on every /text route
    pub authenticator: Arc<dyn Authenticator>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<AnalysisOrchestrator>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            registry: Arc::clone(orchestrator.registry()),
            orchestrator,
            authenticator,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// Health is public; every /text route requires authentication.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/text/analyze", post(api::analyze_text))
        .route("/text/analyze/:category", post(api::analyze_single))
        .route("/text/models/status", get(api::models_status))
        .route("/text/service/info", get(api::service_info))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
