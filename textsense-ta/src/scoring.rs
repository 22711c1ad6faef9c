//! Result shaping and score rounding
//!
//! Scores are surfaced with two decimals: `round(score * 100) / 100`, rounding
//! to nearest with ties away from zero (`f64::round`).

use crate::pipeline::PipelineError;
use crate::types::{CategoryOutput, LabelScore, NamedEntity, RawOutput, TaskKind};

/// Round a raw confidence to two decimals within [0, 1]
///
/// Non-finite input becomes 0.0.
///
/// # Examples
/// ```
/// use textsense_ta::scoring::round_score;
///
/// assert_eq!(round_score(0.9537), 0.95);
/// assert_eq!(round_score(0.955), 0.96);
/// ```
pub fn round_score(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    (raw.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

/// Shape raw pipeline output into the category's public result
///
/// Classification output is reduced to the highest-scoring label. Entity
/// spans keep their order; missing offsets default to 0.
pub fn shape_output(task: TaskKind, raw: RawOutput) -> Result<CategoryOutput, PipelineError> {
    match (task.produces_entities(), raw) {
        (false, RawOutput::Labels(labels)) => labels
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .map(|top| {
                CategoryOutput::Label(LabelScore {
                    label: top.label,
                    score: round_score(top.score),
                })
            })
            .ok_or_else(|| PipelineError::UnexpectedOutput("Pipeline returned no labels".to_string())),
        (true, RawOutput::Entities(spans)) => Ok(CategoryOutput::Entities(
            spans
                .into_iter()
                .map(|span| NamedEntity {
                    entity: span.entity,
                    word: span.word,
                    start: span.start.unwrap_or(0),
                    end: span.end.unwrap_or(0),
                    score: round_score(span.score),
                })
                .collect(),
        )),
        (_, other) => Err(PipelineError::UnexpectedOutput(format!(
            "{} pipeline produced mismatched output: {:?}",
            task, other
        ))),
    }
}
