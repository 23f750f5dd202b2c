//! Conversational ticket recommendation with iterative self-reflection.
//!
//! A request is turned into structured [`Needs`], candidate tickets are scored and ranked
//! into a [`Recommendation`], the result is judged on three quality dimensions, and weak
//! results are refined by adjusting the needs and rebuilding. The loop is bounded by
//! [`RefinementSettings`] and always hands back the best recommendation it has seen.

mod adjust;
pub mod capabilities;
pub mod controller;
pub mod domain;
pub mod extractor;
pub mod llm;
pub mod quality;
pub mod reflector;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod supplier;

#[cfg(test)]
mod tests;

pub use adjust::{
    apply_adjustments, AdjustablePath, AdjustmentError, AdjustmentMap, AdjustmentReport,
    WindowField,
};
pub use capabilities::{
    CandidateSupplier, ExtractionError, JudgmentError, NeedsExtractor, QualityJudge,
    ReflectError, Reflector, SourcingError,
};
pub use controller::{
    CancellationFlag, RefinementController, RefinementOutcome, RefinementSettings, StopReason,
};
pub use domain::{
    Budget, DirectiveKind, ImprovementDirective, Needs, PartialNeeds, PriceLevel, QualityScore,
    Recommendation, RecommendationId, RecommendationOption, RecommendationStatus,
    ReflectionFeedback, ScoreFactor, ScoreReason, SeatClass, Ticket, TicketExtras,
    TimePreference, TimeWindow, TransferStop, TransportMode, TravelPriority,
};
pub use extractor::KeywordNeedsExtractor;
pub use llm::{CompletionClient, CompletionError, LlmAdvisor, OpenAiCompatibleClient};
pub use quality::{Evaluation, JudgeVerdict, JudgmentSource, QualityEvaluator};
pub use reflector::HeuristicReflector;
pub use repository::{RecommendationStore, RecommendationSummary, StoreError, StoredRecommendation};
pub use router::recommendation_router;
pub use scoring::{ScoredTicket, ScoringEngine};
pub use service::{
    RecommendationRequest, RecommendationResponse, RecommendationService,
    RecommendationServiceError, ReflectRequest,
};
pub use supplier::MockCandidateSupplier;
