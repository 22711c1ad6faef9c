//! Model catalogue
//!
//! Built-in model per category, plus merging of configured overrides into the
//! slot list the registry is constructed with.

use std::collections::BTreeMap;
use textsense_common::config::ModelConfig;
use textsense_common::{Error, Result};

use crate::types::{Category, PipelineSpec, TaskKind};

/// Built-in hub model for each category
pub fn default_model_id(category: Category) -> &'static str {
    match category {
        Category::Sentiment => "distilbert/distilbert-base-uncased-finetuned-sst-2-english",
        Category::Entities => "dslim/bert-base-NER",
        Category::Emotion => "j-hartmann/emotion-english-distilroberta-base",
        Category::Intent => "microsoft/DialoGPT-medium",
    }
}

/// Spec for one category using the built-in model
pub fn default_spec(category: Category) -> PipelineSpec {
    PipelineSpec::new(category, default_model_id(category))
}

/// Slot specs for every category, applying configured overrides
///
/// Each category may be overridden at most once.
pub fn specs_from_config(overrides: &[ModelConfig]) -> Result<Vec<PipelineSpec>> {
    let mut specs: BTreeMap<Category, PipelineSpec> = Category::ALL
        .iter()
        .map(|&c| (c, default_spec(c)))
        .collect();
    let mut seen = Vec::new();

    for entry in overrides {
        let category: Category = entry.category.parse().map_err(Error::Config)?;
        if seen.contains(&category) {
            return Err(Error::Config(format!(
                "Model for category '{}' configured more than once",
                category
            )));
        }
        seen.push(category);

        if entry.model_id.trim().is_empty() {
            return Err(Error::Config(format!(
                "Model id for category '{}' is empty",
                category
            )));
        }

        let task = match &entry.task {
            Some(task) => task.parse::<TaskKind>().map_err(Error::Config)?,
            None => category.default_task(),
        };

        specs.insert(
            category,
            PipelineSpec {
                category,
                model_id: entry.model_id.trim().to_string(),
                task,
                serialize_invocations: entry.serialize_invocations,
            },
        );
    }

    Ok(specs.into_values().collect())
}
