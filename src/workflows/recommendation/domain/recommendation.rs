use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::needs::Needs;
use super::ticket::Ticket;

/// Identifier wrapper for recommendation results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecommendationId(pub String);

impl RecommendationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RecommendationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refined,
}

impl RecommendationStatus {
    pub fn label(self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Processing => "processing",
            RecommendationStatus::Completed => "completed",
            RecommendationStatus::Failed => "failed",
            RecommendationStatus::Refined => "refined",
        }
    }
}

/// Scoring factors contributing to an option's match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    TransportType,
    SeatClass,
    Price,
    DepartureTime,
    Duration,
    Availability,
}

/// One line of the explanation attached to an option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReason {
    pub factor: ScoreFactor,
    pub description: String,
    pub weight: f64,
    pub score: f64,
}

/// A ranked ticket together with its score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationOption {
    pub option_id: String,
    pub ticket: Ticket,
    pub score: f64,
    pub rank: usize,
    pub reasons: Vec<ScoreReason>,
}

pub const NEEDS_MATCH_WEIGHT: f64 = 0.5;
pub const COMPLETENESS_WEIGHT: f64 = 0.3;
pub const PRACTICALITY_WEIGHT: f64 = 0.2;

/// Multi-dimensional quality judgment of a recommendation set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityScore {
    pub needs_match: f64,
    pub completeness: f64,
    pub practicality: f64,
    pub overall: f64,
}

impl QualityScore {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Builds a score whose overall value is the fixed weighted sum, rounded to one decimal.
    pub fn from_dimensions(needs_match: f64, completeness: f64, practicality: f64) -> Self {
        let needs_match = clamp_score(needs_match);
        let completeness = clamp_score(completeness);
        let practicality = clamp_score(practicality);
        let overall = needs_match * NEEDS_MATCH_WEIGHT
            + completeness * COMPLETENESS_WEIGHT
            + practicality * PRACTICALITY_WEIGHT;

        Self {
            needs_match,
            completeness,
            practicality,
            overall: (overall * 10.0).round() / 10.0,
        }
    }

    /// Builds a score with an externally supplied overall value.
    pub fn with_overall(
        needs_match: f64,
        completeness: f64,
        practicality: f64,
        overall: f64,
    ) -> Self {
        Self {
            needs_match: clamp_score(needs_match),
            completeness: clamp_score(completeness),
            practicality: clamp_score(practicality),
            overall: clamp_score(overall),
        }
    }
}

pub(crate) fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Categories of improvement directives, used to derive weaknesses and local adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    NoOptions,
    CoreNeeds,
    Budget,
    DepartureTime,
    Diversity,
    ModeCoverage,
    Availability,
    DirectRoutes,
    Polish,
    General,
    JudgeFallback,
    External,
}

/// Concrete, actionable gap reported by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementDirective {
    pub kind: DirectiveKind,
    pub message: String,
}

impl ImprovementDirective {
    pub fn new(kind: DirectiveKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Weakness statement recorded in the reflection history.
    pub fn weakness(&self) -> Option<String> {
        let text = match self.kind {
            DirectiveKind::NoOptions => "no candidate matched the request",
            DirectiveKind::CoreNeeds => "top options miss the traveler's core needs",
            DirectiveKind::Budget => "some options exceed the budget ceiling",
            DirectiveKind::DepartureTime => "departure times drift from the preferred window",
            DirectiveKind::Diversity => "too few distinct options were offered",
            DirectiveKind::ModeCoverage => "not every preferred transport mode is covered",
            DirectiveKind::Availability => "many options cannot be booked right away",
            DirectiveKind::DirectRoutes => "no direct service is offered",
            DirectiveKind::JudgeFallback => "quality judgment was unavailable",
            DirectiveKind::External => return Some(self.message.clone()),
            DirectiveKind::Polish | DirectiveKind::General => return None,
        };
        Some(text.to_string())
    }
}

impl fmt::Display for ImprovementDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Audit record for one evaluate, adjust, rebuild cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionFeedback {
    pub reflection_id: String,
    pub iteration: u32,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvement_suggestions: Vec<ImprovementDirective>,
    pub adjusted_parameters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored_parameters: Vec<String>,
    /// Needs the evaluated recommendation was built from.
    pub needs: Needs,
    pub scores: QualityScore,
    pub option_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Ranked output of one iteration plus its quality judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommendation_id: RecommendationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub query_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: RecommendationStatus,
    pub options: Vec<RecommendationOption>,
    pub scores: QualityScore,
    pub reflection_iterations: u32,
    pub reflection_history: Vec<ReflectionFeedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Recommendation {
    pub fn new(query_text: impl Into<String>, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            recommendation_id: RecommendationId::generate(),
            user_id,
            query_text: query_text.into(),
            created_at: now,
            updated_at: now,
            status: RecommendationStatus::Pending,
            options: Vec::new(),
            scores: QualityScore::zero(),
            reflection_iterations: 0,
            reflection_history: Vec::new(),
            processing_time_ms: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Terminal failure carrying a diagnostic note.
    pub fn failed(
        query_text: impl Into<String>,
        user_id: Option<String>,
        note: impl Into<String>,
    ) -> Self {
        let mut recommendation = Self::new(query_text, user_id);
        recommendation.status = RecommendationStatus::Failed;
        recommendation.note("error", Value::String(note.into()));
        recommendation
    }

    pub fn top_option(&self) -> Option<&RecommendationOption> {
        self.options.iter().min_by_key(|option| option.rank)
    }

    pub fn add_reflection(&mut self, feedback: ReflectionFeedback) {
        self.reflection_history.push(feedback);
        self.reflection_iterations += 1;
        self.updated_at = Utc::now();
    }

    pub fn note(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn set_status(&mut self, status: RecommendationStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_uses_fixed_weights() {
        let score = QualityScore::from_dimensions(80.0, 70.0, 60.0);
        assert_eq!(score.overall, 73.0);
    }

    #[test]
    fn dimensions_are_clamped() {
        let score = QualityScore::from_dimensions(140.0, -5.0, f64::NAN);
        assert_eq!(score.needs_match, 100.0);
        assert_eq!(score.completeness, 0.0);
        assert_eq!(score.practicality, 0.0);
        assert_eq!(score.overall, 50.0);
    }

    #[test]
    fn failed_recommendation_carries_note() {
        let recommendation = Recommendation::failed("Beijing to Shanghai", None, "supplier down");
        assert_eq!(recommendation.status, RecommendationStatus::Failed);
        assert_eq!(recommendation.scores, QualityScore::zero());
        assert_eq!(
            recommendation.metadata.get("error"),
            Some(&Value::String("supplier down".to_string()))
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        let value = serde_json::to_value(RecommendationStatus::Refined).expect("serializes");
        assert_eq!(value, serde_json::json!("refined"));
    }
}
