//! Contracts for the external collaborators the refinement loop depends on.

use async_trait::async_trait;

use super::adjust::AdjustmentMap;
use super::domain::{ImprovementDirective, Needs, PartialNeeds, QualityScore, Recommendation, Ticket};
use super::quality::JudgeVerdict;

/// Turns conversational text into structured needs.
#[async_trait]
pub trait NeedsExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Needs, ExtractionError>;
}

/// Supplies candidate tickets for the current needs. The result may be empty, unsorted and
/// non-exhaustive.
#[async_trait]
pub trait CandidateSupplier: Send + Sync {
    async fn supply(&self, needs: &Needs) -> Result<Vec<Ticket>, SourcingError>;
}

/// Proposes sparse dotted-path adjustments to the needs after a weak evaluation.
#[async_trait]
pub trait Reflector: Send + Sync {
    async fn reflect(
        &self,
        needs: &Needs,
        scores: &QualityScore,
        directives: &[ImprovementDirective],
    ) -> Result<AdjustmentMap, ReflectError>;
}

/// Optional external judge overriding the local quality rubric.
#[async_trait]
pub trait QualityJudge: Send + Sync {
    async fn judge(
        &self,
        recommendation: &Recommendation,
        needs: &Needs,
    ) -> Result<JudgeVerdict, JudgmentError>;
}

/// Extraction produced nothing usable; carries whatever was read before failing.
#[derive(Debug, thiserror::Error)]
#[error("needs extraction failed: {reason}")]
pub struct ExtractionError {
    pub reason: String,
    pub partial: PartialNeeds,
}

impl ExtractionError {
    pub fn new(reason: impl Into<String>, partial: PartialNeeds) -> Self {
        Self {
            reason: reason.into(),
            partial,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourcingError {
    #[error("candidate source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ReflectError {
    #[error("reflection response malformed: {0}")]
    Malformed(String),
    #[error("reflection capability unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum JudgmentError {
    #[error("judgment malformed: {0}")]
    Malformed(String),
    #[error("judge unavailable: {0}")]
    Unavailable(String),
}
