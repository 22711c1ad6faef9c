//! Inference pipeline abstraction
//!
//! A pipeline is an opaque `text -> RawOutput` function for one category.
//! Loaders construct pipelines from a [`PipelineSpec`]; construction is slow
//! and may fail independently per slot.
//!
//! # Concurrency Policy
//! Pipelines must be `Send + Sync` and are invoked concurrently by
//! simultaneous requests. Backends that cannot tolerate concurrent calls are
//! wrapped in [`SerializedPipeline`] (enabled per slot with
//! `serialize_invocations = true`), which admits one call at a time.

pub mod hub;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::types::{PipelineSpec, RawOutput};

/// Pipeline construction or invocation failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// No access token available for an authenticated backend
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Transport failure reaching the backend
    #[error("Network error: {0}")]
    Network(String),

    /// Backend returned an error status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Backend output did not match the task kind
    #[error("Unexpected output: {0}")]
    UnexpectedOutput(String),

    #[error("Timed out")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,

    #[error("Pipeline panicked")]
    Panicked,
}

/// Per-request deadline and cancellation, passed into every invocation
#[derive(Debug, Clone)]
pub struct InvocationContext {
    request_id: Uuid,
    deadline: Instant,
    cancel: CancellationToken,
}

impl InvocationContext {
    /// Context expiring `timeout` from now
    pub fn new(timeout: Duration) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            deadline: Instant::now() + timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline (zero once expired)
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Loaded inference pipeline
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn invoke(&self, text: &str, ctx: &InvocationContext) -> Result<RawOutput, PipelineError>;
}

/// Pipeline construction function
#[async_trait]
pub trait PipelineLoader: Send + Sync {
    async fn load(&self, spec: &PipelineSpec) -> Result<Arc<dyn Pipeline>, PipelineError>;
}

/// Serializes invocations of a pipeline that is unsafe for concurrent calls
pub struct SerializedPipeline {
    inner: Arc<dyn Pipeline>,
    lock: Mutex<()>,
}

impl SerializedPipeline {
    pub fn new(inner: Arc<dyn Pipeline>) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl Pipeline for SerializedPipeline {
    async fn invoke(&self, text: &str, ctx: &InvocationContext) -> Result<RawOutput, PipelineError> {
        let _permit = tokio::select! {
            permit = self.lock.lock() => permit,
            _ = ctx.cancel_token().cancelled() => return Err(PipelineError::Cancelled),
        };
        self.inner.invoke(text, ctx).await
    }
}

// ============================================================================
// Mock Pipelines for Testing
// ============================================================================
