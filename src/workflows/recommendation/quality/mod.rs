//! Multi-dimensional quality evaluation of a recommendation set.

mod directives;
mod judge;
mod rules;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::capabilities::{JudgmentError, QualityJudge};
use super::domain::{ImprovementDirective, Needs, QualityScore, Recommendation};

pub use judge::JudgeVerdict;
pub(crate) use judge::extract_json_object;

/// Where a judgment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgmentSource {
    Rules,
    Judge,
    Fallback,
}

/// Scores plus the directives derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub scores: QualityScore,
    pub directives: Vec<ImprovementDirective>,
    /// Sufficiency opinion of an external judge, when one answered.
    pub sufficient: Option<bool>,
    pub source: JudgmentSource,
}

impl Evaluation {
    fn no_options() -> Self {
        Self {
            scores: QualityScore::zero(),
            directives: vec![directives::no_options_directive()],
            sufficient: Some(false),
            source: JudgmentSource::Rules,
        }
    }

    fn fallback() -> Self {
        Self {
            scores: judge::fallback_scores(),
            directives: vec![judge::fallback_directive()],
            sufficient: Some(false),
            source: JudgmentSource::Fallback,
        }
    }
}

/// Evaluator applying the local rubric, optionally deferring to an external judge.
#[derive(Clone, Default)]
pub struct QualityEvaluator {
    judge: Option<Arc<dyn QualityJudge>>,
}

impl QualityEvaluator {
    pub fn rule_based() -> Self {
        Self { judge: None }
    }

    pub fn with_judge(judge: Arc<dyn QualityJudge>) -> Self {
        Self { judge: Some(judge) }
    }

    pub async fn evaluate(&self, recommendation: &Recommendation, needs: &Needs) -> Evaluation {
        if recommendation.options.is_empty() {
            return Evaluation::no_options();
        }

        let Some(judge) = &self.judge else {
            return self.evaluate_rules(recommendation, needs);
        };

        match judge.judge(recommendation, needs).await {
            Ok(verdict) => {
                let scores = verdict.scores();
                let directives = verdict.directives(&scores);
                info!(overall = scores.overall, "external judge scored recommendation");
                Evaluation {
                    scores,
                    directives,
                    sufficient: verdict.is_sufficient,
                    source: JudgmentSource::Judge,
                }
            }
            Err(JudgmentError::Malformed(detail)) => {
                warn!(%detail, "judge output malformed, using low-confidence default");
                Evaluation::fallback()
            }
            Err(JudgmentError::Unavailable(detail)) => {
                warn!(%detail, "judge unavailable, falling back to rule-based evaluation");
                self.evaluate_rules(recommendation, needs)
            }
        }
    }

    /// Pure rule-based judgment.
    pub fn evaluate_rules(&self, recommendation: &Recommendation, needs: &Needs) -> Evaluation {
        if recommendation.options.is_empty() {
            return Evaluation::no_options();
        }

        let scores = QualityScore::from_dimensions(
            rules::needs_match(recommendation, needs),
            rules::completeness(recommendation),
            rules::practicality(recommendation, needs),
        );
        let directives = directives::improvement_directives(recommendation, needs, &scores);

        info!(
            needs_match = scores.needs_match,
            completeness = scores.completeness,
            practicality = scores.practicality,
            overall = scores.overall,
            "evaluated recommendation quality"
        );

        Evaluation {
            scores,
            directives,
            sufficient: None,
            source: JudgmentSource::Rules,
        }
    }
}
