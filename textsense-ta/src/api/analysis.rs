//! Text analysis endpoints
//!
//! - POST /text/analyze: every requested category, degraded per category
//! - POST /text/analyze/:category: one category, gated on readiness

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use textsense_common::auth::Principal;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::types::{AggregateResponse, Category, CategoryOutput};
use crate::AppState;

/// Full analysis request body
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzeRequest {
    pub text: String,
    /// Restricts the analysis to these categories (default: all configured)
    #[serde(default)]
    pub categories: Option<Vec<Category>>,
}

/// Single-category request body
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzeTextRequest {
    pub text: String,
}

/// POST /text/analyze
pub async fn analyze_text(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<AggregateResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let categories: BTreeSet<Category> = match request.categories {
        Some(list) => list.into_iter().collect(),
        None => state.registry.categories().collect(),
    };
    debug!(principal = %principal, categories = categories.len(), "Full analysis requested");

    let response = state.orchestrator.analyze(&request.text, &categories).await?;
    Ok(Json(response))
}

/// POST /text/analyze/:category
pub async fn analyze_single(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<AnalyzeTextRequest>, JsonRejection>,
) -> ApiResult<Json<CategoryOutput>> {
    let category: Category = category.parse().map_err(ApiError::NotFound)?;
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    debug!(principal = %principal, category = %category, "Single-category analysis requested");

    let output = state
        .orchestrator
        .analyze_category(&request.text, category)
        .await?;
    Ok(Json(output))
}
