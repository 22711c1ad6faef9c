//! Hugging Face Inference API backend
//!
//! Each pipeline is a hosted model reached over HTTP:
//! `POST {base_url}/models/{model_id}` with a bearer token.
//!
//! Loading issues a warm-up request with `wait_for_model` so that the slot only
//! becomes Ready once the hosted model answers with output of the expected
//! shape. HTTP pipelines are safe for concurrent invocation.
//!
//! # API Reference
//! - Classification tasks return `[[{label, score}, ...]]` (sometimes flat)
//! - Token classification returns `[{entity_group|entity, word, start, end, score}]`

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{InvocationContext, Pipeline, PipelineError, PipelineLoader};
use crate::types::{PipelineSpec, RawEntity, RawLabel, RawOutput, TaskKind};

/// Input sent during the warm-up call
const WARM_UP_INPUT: &str = "Warm-up request from textsense.";

/// Constructs [`HubPipeline`]s for registry slots
pub struct HubLoader {
    http_client: Client,
    base_url: String,
    token: Option<String>,
}

impl HubLoader {
    /// Create a loader; a `None` token makes every load fail with missing credentials
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        http_timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let http_client = Client::builder()
            .timeout(http_timeout)
            .user_agent(concat!("textsense-ta/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

#[async_trait]
impl PipelineLoader for HubLoader {
    async fn load(&self, spec: &PipelineSpec) -> Result<Arc<dyn Pipeline>, PipelineError> {
        let token = self.token.clone().ok_or_else(|| {
            PipelineError::MissingCredentials(format!(
                "{} requires a Hugging Face access token",
                spec.model_id
            ))
        })?;

        let pipeline = HubPipeline {
            http_client: self.http_client.clone(),
            url: format!("{}/models/{}", self.base_url, spec.model_id),
            token,
            task: spec.task,
        };

        debug!(model = %spec.model_id, task = %spec.task, "Warming up hub model");
        pipeline.request(WARM_UP_INPUT, true, None).await?;

        Ok(Arc::new(pipeline))
    }
}

/// One hosted model
pub struct HubPipeline {
    http_client: Client,
    url: String,
    token: String,
    task: TaskKind,
}

impl HubPipeline {
    async fn request(
        &self,
        text: &str,
        wait_for_model: bool,
        timeout: Option<Duration>,
    ) -> Result<RawOutput, PipelineError> {
        let body = json!({
            "inputs": text,
            "options": { "wait_for_model": wait_for_model },
        });

        let mut request = self
            .http_client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PipelineError::Timeout
            } else {
                PipelineError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let payload = response
            .text()
            .await
            .map_err(|e| PipelineError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                message: error_message(&payload),
            });
        }

        let value: Value = serde_json::from_str(&payload)
            .map_err(|e| PipelineError::UnexpectedOutput(format!("Invalid JSON: {}", e)))?;
        decode_output(self.task, value)
    }
}

#[async_trait]
impl Pipeline for HubPipeline {
    async fn invoke(&self, text: &str, ctx: &InvocationContext) -> Result<RawOutput, PipelineError> {
        let remaining = ctx.remaining();
        if remaining.is_zero() {
            return Err(PipelineError::Timeout);
        }
        self.request(text, false, Some(remaining)).await
    }
}

/// Extract the `error` field of an API error body, falling back to raw text
fn error_message(payload: &str) -> String {
    serde_json::from_str::<Value>(payload)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| payload.trim().to_string())
}

/// Span as returned by token classification
#[derive(Debug, Deserialize)]
struct HubEntity {
    #[serde(default)]
    entity_group: Option<String>,
    #[serde(default)]
    entity: Option<String>,
    word: String,
    #[serde(default)]
    start: Option<usize>,
    #[serde(default)]
    end: Option<usize>,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HubLabels {
    Nested(Vec<Vec<RawLabel>>),
    Flat(Vec<RawLabel>),
}

/// Decode a hub response body according to the task kind
pub fn decode_output(task: TaskKind, value: Value) -> Result<RawOutput, PipelineError> {
    if task.produces_entities() {
        let spans: Vec<HubEntity> = serde_json::from_value(value).map_err(|e| {
            PipelineError::UnexpectedOutput(format!("Expected entity list for {}: {}", task, e))
        })?;

        spans
            .into_iter()
            .map(|span| {
                let entity = span.entity_group.or(span.entity).ok_or_else(|| {
                    PipelineError::UnexpectedOutput(format!("Entity '{}' has no type", span.word))
                })?;
                Ok(RawEntity {
                    entity,
                    word: span.word,
                    start: span.start,
                    end: span.end,
                    score: span.score,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(RawOutput::Entities)
    } else {
        let labels: HubLabels = serde_json::from_value(value).map_err(|e| {
            PipelineError::UnexpectedOutput(format!("Expected label list for {}: {}", task, e))
        })?;

        let labels = match labels {
            HubLabels::Nested(mut batches) => {
                if batches.is_empty() {
                    Vec::new()
                } else {
                    batches.swap_remove(0)
                }
            }
            HubLabels::Flat(labels) => labels,
        };
        Ok(RawOutput::Labels(labels))
    }
}
