//! Shared fixtures for textsense-ta integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use textsense_common::auth::{Authenticator, DisabledAuthenticator, StaticTokenAuthenticator};
use textsense_ta::bootstrap::Bootstrapper;
use textsense_ta::orchestrator::{AnalysisLimits, AnalysisOrchestrator};
use textsense_ta::pipeline::{InvocationContext, Pipeline, PipelineError, PipelineLoader};
use textsense_ta::registry::ModelRegistry;
use textsense_ta::types::{Category, PipelineSpec, RawEntity, RawLabel, RawOutput};
use textsense_ta::{build_router, AppState};

pub const TEST_TOKEN: &str = "integration-test-token";

/// Pipeline returning a fixed output
pub struct FixedPipeline(pub RawOutput);

#[async_trait]
impl Pipeline for FixedPipeline {
    async fn invoke(&self, _text: &str, _ctx: &InvocationContext) -> Result<RawOutput, PipelineError> {
        Ok(self.0.clone())
    }
}

/// Pipeline labelling each input with the input text itself
pub struct EchoPipeline {
    pub delay: Duration,
}

#[async_trait]
impl Pipeline for EchoPipeline {
    async fn invoke(&self, text: &str, _ctx: &InvocationContext) -> Result<RawOutput, PipelineError> {
        tokio::time::sleep(self.delay).await;
        Ok(RawOutput::Labels(vec![RawLabel {
            label: text.to_string(),
            score: 0.5,
        }]))
    }
}

/// Pipeline whose every invocation fails
pub struct BrokenPipeline;

#[async_trait]
impl Pipeline for BrokenPipeline {
    async fn invoke(&self, _text: &str, _ctx: &InvocationContext) -> Result<RawOutput, PipelineError> {
        Err(PipelineError::Api {
            status: 500,
            message: "inference backend crashed".to_string(),
        })
    }
}

pub fn sentiment_pipeline() -> Arc<dyn Pipeline> {
    Arc::new(FixedPipeline(RawOutput::Labels(vec![
        RawLabel {
            label: "NEGATIVE".to_string(),
            score: 0.0463,
        },
        RawLabel {
            label: "POSITIVE".to_string(),
            score: 0.9537,
        },
    ])))
}

pub fn entity_pipeline() -> Arc<dyn Pipeline> {
    Arc::new(FixedPipeline(RawOutput::Entities(vec![RawEntity {
        entity: "ORG".to_string(),
        word: "Acme".to_string(),
        start: Some(0),
        end: Some(4),
        score: 0.99871,
    }])))
}

/// How the fake loader resolves one category
pub enum Outcome {
    Ready(Arc<dyn Pipeline>),
    Fail(&'static str),
    /// Held until the notify fires
    Held(Arc<Notify>, Arc<dyn Pipeline>),
}

/// Loader driven by a per-category outcome table
#[derive(Default)]
pub struct ScriptedLoader {
    outcomes: Mutex<HashMap<Category, Outcome>>,
}

impl ScriptedLoader {
    pub fn with(self, category: Category, outcome: Outcome) -> Self {
        self.outcomes.lock().unwrap().insert(category, outcome);
        self
    }
}

#[async_trait]
impl PipelineLoader for ScriptedLoader {
    async fn load(&self, spec: &PipelineSpec) -> Result<Arc<dyn Pipeline>, PipelineError> {
        let outcome = self.outcomes.lock().unwrap().remove(&spec.category);
        match outcome {
            Some(Outcome::Ready(p)) => Ok(p),
            Some(Outcome::Fail(msg)) => Err(PipelineError::Network(msg.to_string())),
            Some(Outcome::Held(notify, p)) => {
                notify.notified().await;
                Ok(p)
            }
            None => Err(PipelineError::Network("no outcome scripted".to_string())),
        }
    }
}

/// Registry populated by a real bootstrap run over the scripted loader
pub async fn bootstrapped_registry(loader: ScriptedLoader) -> Arc<ModelRegistry> {
    let registry = Arc::new(
        ModelRegistry::new(
            Category::ALL
                .iter()
                .map(|&c| PipelineSpec::new(c, format!("test/{}", c)))
                .collect(),
        )
        .unwrap(),
    );
    Bootstrapper::new(Arc::clone(&registry), Arc::new(loader))
        .run()
        .await;
    registry
}

pub fn token_authenticator() -> Arc<dyn Authenticator> {
    Arc::new(StaticTokenAuthenticator::from_tokens([("tests", TEST_TOKEN)]))
}

pub fn open_authenticator() -> Arc<dyn Authenticator> {
    Arc::new(DisabledAuthenticator)
}

pub fn app_with(registry: Arc<ModelRegistry>, authenticator: Arc<dyn Authenticator>) -> axum::Router {
    let orchestrator = Arc::new(AnalysisOrchestrator::new(registry, AnalysisLimits::default()));
    build_router(AppState::new(orchestrator, authenticator))
}
