//! Core types for the text analysis service
//!
//! - Categories and task kinds (closed sets)
//! - Pipeline specifications (what each registry slot loads)
//! - Raw pipeline output and the shaped per-category results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Catalogue Types
// ============================================================================

/// Analysis category
///
/// Fixed closed set. Each category maps to exactly one registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sentiment,
    #[serde(alias = "ner")]
    Entities,
    Emotion,
    Intent,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Sentiment,
        Category::Entities,
        Category::Emotion,
        Category::Intent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sentiment => "sentiment",
            Category::Entities => "entities",
            Category::Emotion => "emotion",
            Category::Intent => "intent",
        }
    }

    /// Task kind normally used for this category
    pub fn default_task(&self) -> TaskKind {
        match self {
            Category::Sentiment => TaskKind::SentimentAnalysis,
            Category::Entities => TaskKind::TokenClassification,
            Category::Emotion | Category::Intent => TaskKind::TextClassification,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentiment" => Ok(Category::Sentiment),
            "entities" | "ner" => Ok(Category::Entities),
            "emotion" => Ok(Category::Emotion),
            "intent" => Ok(Category::Intent),
            other => Err(format!("Unknown analysis category: {}", other)),
        }
    }
}

/// Inference task kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    SentimentAnalysis,
    TokenClassification,
    TextClassification,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::SentimentAnalysis => "sentiment-analysis",
            TaskKind::TokenClassification => "token-classification",
            TaskKind::TextClassification => "text-classification",
        }
    }

    /// Token classification yields spans; everything else yields labels
    pub fn produces_entities(&self) -> bool {
        matches!(self, TaskKind::TokenClassification)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentiment-analysis" => Ok(TaskKind::SentimentAnalysis),
            "token-classification" | "ner" => Ok(TaskKind::TokenClassification),
            "text-classification" => Ok(TaskKind::TextClassification),
            other => Err(format!("Unknown task kind: {}", other)),
        }
    }
}

/// Identity of the pipeline a slot loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
    pub category: Category,
    /// Hub model identifier
    pub model_id: String,
    pub task: TaskKind,
    /// Serialize invocations through a per-slot lock
    pub serialize_invocations: bool,
}

impl PipelineSpec {
    pub fn new(category: Category, model_id: impl Into<String>) -> Self {
        Self {
            category,
            model_id: model_id.into(),
            task: category.default_task(),
            serialize_invocations: false,
        }
    }
}

// ============================================================================
// Raw Pipeline Output
// ============================================================================

/// One scored label as produced by a classification pipeline
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawLabel {
    pub label: String,
    pub score: f64,
}

/// One detected span as produced by a token classification pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntity {
    pub entity: String,
    pub word: String,
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub score: f64,
}

/// Unshaped pipeline output
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    Labels(Vec<RawLabel>),
    Entities(Vec<RawEntity>),
}

// ============================================================================
// Shaped Results
// ============================================================================

/// Top label with its rounded confidence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Named entity with rounded confidence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedEntity {
    /// Entity type: PER, ORG, LOC, MISC, ...
    pub entity: String,
    pub word: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
}

/// Successful result for one category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CategoryOutput {
    Label(LabelScore),
    Entities(Vec<NamedEntity>),
}

/// Why a category has no result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// Slot never reached Ready (or is not configured)
    NotLoaded,
    /// Ready pipeline failed for this request
    ExecutionFailed,
}

/// Placeholder for a category without a result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unavailable {
    pub reason: UnavailableReason,
    pub message: String,
}

/// Per-category entry of an aggregate response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CategoryResult {
    Available(CategoryOutput),
    Unavailable(Unavailable),
}

impl CategoryResult {
    pub fn not_loaded(message: impl Into<String>) -> Self {
        CategoryResult::Unavailable(Unavailable {
            reason: UnavailableReason::NotLoaded,
            message: message.into(),
        })
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        CategoryResult::Unavailable(Unavailable {
            reason: UnavailableReason::ExecutionFailed,
            message: message.into(),
        })
    }

    pub fn is_available(&self) -> bool {
        matches!(self, CategoryResult::Available(_))
    }

    pub fn unavailable_reason(&self) -> Option<UnavailableReason> {
        match self {
            CategoryResult::Available(_) => None,
            CategoryResult::Unavailable(u) => Some(u.reason),
        }
    }
}

/// Full analysis response
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResponse {
    pub text: String,
    /// Exactly one entry per requested category
    pub analysis: BTreeMap<Category, CategoryResult>,
    /// Captured when aggregation completes
    pub timestamp: DateTime<Utc>,
}
