//! Bounded refine/evaluate loop over immutable needs snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::adjust::{apply_adjustments, AdjustmentMap, AdjustmentReport};
use super::capabilities::{CandidateSupplier, NeedsExtractor, Reflector};
use super::domain::{
    Needs, PartialNeeds, Recommendation, RecommendationStatus, ReflectionFeedback, Ticket,
};
use super::quality::{Evaluation, QualityEvaluator};
use super::scoring::ScoringEngine;

const STRENGTH_THRESHOLD: f64 = 85.0;

/// Loop bounds. Every entry point passes these explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinementSettings {
    pub max_iterations: u32,
    pub score_threshold: f64,
    pub max_options: usize,
}

impl Default for RefinementSettings {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            score_threshold: 85.0,
            max_options: 10,
        }
    }
}

impl RefinementSettings {
    pub fn new(max_iterations: u32, score_threshold: f64) -> Self {
        Self {
            max_iterations,
            score_threshold,
            ..Self::default()
        }
    }
}

/// Cooperative cancellation observed between suspending calls.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Why the loop reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ThresholdMet,
    IterationBudgetExhausted,
    SourcingEmpty,
    SourcingFailed,
    Cancelled,
}

impl StopReason {
    pub fn label(self) -> &'static str {
        match self {
            StopReason::ThresholdMet => "threshold_met",
            StopReason::IterationBudgetExhausted => "iteration_budget_exhausted",
            StopReason::SourcingEmpty => "sourcing_empty",
            StopReason::SourcingFailed => "sourcing_failed",
            StopReason::Cancelled => "cancelled",
        }
    }
}

/// Final recommendation plus the needs it was built from.
#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    pub recommendation: Recommendation,
    pub needs: Needs,
    pub stop_reason: StopReason,
}

enum RefinementState {
    Extracting,
    Building {
        needs: Needs,
    },
    Evaluating {
        needs: Needs,
        recommendation: Recommendation,
    },
    Adjusting {
        needs: Needs,
        recommendation: Recommendation,
        evaluation: Evaluation,
    },
    Stopped(RefinementOutcome),
}

impl RefinementState {
    fn name(&self) -> &'static str {
        match self {
            RefinementState::Extracting => "extracting",
            RefinementState::Building { .. } => "building",
            RefinementState::Evaluating { .. } => "evaluating",
            RefinementState::Adjusting { .. } => "adjusting",
            RefinementState::Stopped(_) => "stopped",
        }
    }
}

struct Candidate {
    iteration: u32,
    recommendation: Recommendation,
    needs: Needs,
}

struct LoopContext {
    query: String,
    user_id: Option<String>,
    settings: RefinementSettings,
    started: Instant,
    cycles: u32,
    history: Vec<ReflectionFeedback>,
    best: Option<Candidate>,
    latest_needs: Option<Needs>,
}

impl LoopContext {
    fn new(query: &str, user_id: Option<String>, settings: RefinementSettings) -> Self {
        Self {
            query: query.to_string(),
            user_id,
            settings,
            started: Instant::now(),
            cycles: 0,
            history: Vec::new(),
            best: None,
            latest_needs: None,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Keeps the highest scoring recommendation; later iterations win ties.
    fn remember(&mut self, recommendation: &Recommendation, needs: &Needs) {
        let replace = self
            .best
            .as_ref()
            .map(|best| recommendation.scores.overall >= best.recommendation.scores.overall)
            .unwrap_or(true);
        if replace {
            self.best = Some(Candidate {
                iteration: self.cycles,
                recommendation: recommendation.clone(),
                needs: needs.clone(),
            });
        }
    }

    fn finish(&mut self, reason: StopReason, needs: &Needs) -> RefinementOutcome {
        let Some(best) = self.best.take() else {
            let note = match reason {
                StopReason::SourcingEmpty => "no candidate tickets matched the request",
                StopReason::SourcingFailed => "candidate sourcing failed",
                StopReason::Cancelled => "request cancelled before any recommendation was built",
                _ => "no recommendation was produced",
            };
            return self.failed(reason, note, needs);
        };

        let mut recommendation = best.recommendation;
        recommendation.reflection_history = self.history.clone();
        recommendation.reflection_iterations = self.cycles;
        recommendation.processing_time_ms = Some(self.elapsed_ms());
        recommendation.note("selected_iteration", json!(best.iteration));
        recommendation.note("stop_reason", json!(reason.label()));
        recommendation.set_status(RecommendationStatus::Completed);

        info!(
            recommendation_id = %recommendation.recommendation_id,
            overall = recommendation.scores.overall,
            iterations = self.cycles,
            reason = reason.label(),
            "recommendation finalized"
        );

        RefinementOutcome {
            recommendation,
            needs: best.needs,
            stop_reason: reason,
        }
    }

    fn failed(&self, reason: StopReason, note: &str, needs: &Needs) -> RefinementOutcome {
        let mut recommendation =
            Recommendation::failed(self.query.clone(), self.user_id.clone(), note);
        recommendation.reflection_history = self.history.clone();
        recommendation.reflection_iterations = self.cycles;
        recommendation.processing_time_ms = Some(self.elapsed_ms());
        recommendation.note("stop_reason", json!(reason.label()));

        warn!(reason = reason.label(), %note, "recommendation failed");

        RefinementOutcome {
            recommendation,
            needs: needs.clone(),
            stop_reason: reason,
        }
    }
}

/// Orchestrates extraction, building, evaluation and adjustment.
///
/// The controller holds no per-request state; concurrent requests share it freely.
pub struct RefinementController {
    extractor: Arc<dyn NeedsExtractor>,
    supplier: Arc<dyn CandidateSupplier>,
    reflector: Arc<dyn Reflector>,
    scoring: ScoringEngine,
    evaluator: QualityEvaluator,
}

impl RefinementController {
    pub fn new(
        extractor: Arc<dyn NeedsExtractor>,
        supplier: Arc<dyn CandidateSupplier>,
        reflector: Arc<dyn Reflector>,
        evaluator: QualityEvaluator,
    ) -> Self {
        Self {
            extractor,
            supplier,
            reflector,
            scoring: ScoringEngine::new(),
            evaluator,
        }
    }

    /// Runs the full loop for a conversational request.
    pub async fn recommend(
        &self,
        text: &str,
        user_id: Option<String>,
        settings: &RefinementSettings,
        cancel: &CancellationFlag,
    ) -> RefinementOutcome {
        let context = LoopContext::new(text, user_id, *settings);
        self.drive(RefinementState::Extracting, context, cancel).await
    }

    /// Runs the loop from already structured needs, skipping extraction.
    pub async fn refine(
        &self,
        needs: Needs,
        query: &str,
        settings: &RefinementSettings,
        cancel: &CancellationFlag,
    ) -> RefinementOutcome {
        let context = LoopContext::new(query, needs.user_id.clone(), *settings);
        self.drive(
            RefinementState::Building {
                needs: needs.normalized(),
            },
            context,
            cancel,
        )
        .await
    }

    /// Forces one more reflection cycle on a finished recommendation.
    pub async fn reflect_once(
        &self,
        recommendation: &Recommendation,
        needs: &Needs,
        settings: &RefinementSettings,
    ) -> RefinementOutcome {
        let mut context = LoopContext::new(
            &recommendation.query_text,
            recommendation.user_id.clone(),
            RefinementSettings {
                max_iterations: recommendation.reflection_iterations + 1,
                ..*settings
            },
        );
        context.cycles = recommendation.reflection_iterations;
        context.history = recommendation.reflection_history.clone();

        let evaluation = self.evaluator.evaluate(recommendation, needs).await;
        let mut current = recommendation.clone();
        current.scores = evaluation.scores;

        self.drive(
            RefinementState::Adjusting {
                needs: needs.clone(),
                recommendation: current,
                evaluation,
            },
            context,
            &CancellationFlag::new(),
        )
        .await
    }

    /// Extracts needs, degrading to a deterministic fallback on failure.
    pub async fn extract_needs(&self, text: &str) -> Needs {
        match self.extractor.extract(text).await {
            Ok(needs) => needs.normalized(),
            Err(err) => {
                warn!(error = %err, "needs extraction failed, using fallback needs");
                Needs::fallback(&err.partial)
            }
        }
    }

    /// Scores and ranks candidates into a fresh recommendation in `processing` state.
    pub fn build(
        &self,
        needs: &Needs,
        tickets: &[Ticket],
        query: &str,
        settings: &RefinementSettings,
    ) -> Recommendation {
        let started = Instant::now();
        let mut recommendation = Recommendation::new(query, needs.user_id.clone());
        recommendation.set_status(RecommendationStatus::Processing);

        recommendation.options = self
            .scoring
            .rank(tickets, needs)
            .into_iter()
            .take(settings.max_options)
            .enumerate()
            .map(|(index, scored)| scored.into_option(index + 1))
            .collect();
        recommendation.processing_time_ms = Some(started.elapsed().as_millis() as u64);
        recommendation
    }

    #[tracing::instrument(
        name = "refinement",
        skip_all,
        fields(
            start = state.name(),
            max_iterations = context.settings.max_iterations,
            threshold = context.settings.score_threshold
        )
    )]
    async fn drive(
        &self,
        mut state: RefinementState,
        mut context: LoopContext,
        cancel: &CancellationFlag,
    ) -> RefinementOutcome {
        loop {
            debug!(state = state.name(), iteration = context.cycles, "refinement step");
            state = match state {
                RefinementState::Stopped(outcome) => return outcome,
                RefinementState::Extracting => {
                    let mut needs = self.extract_needs(&context.query).await;
                    if context.user_id.is_some() {
                        needs.user_id = context.user_id.clone();
                    }
                    RefinementState::Building { needs }
                }
                RefinementState::Building { needs } => self.on_building(needs, &mut context).await,
                RefinementState::Evaluating {
                    needs,
                    recommendation,
                } => {
                    self.on_evaluating(needs, recommendation, &mut context)
                        .await
                }
                RefinementState::Adjusting {
                    needs,
                    recommendation,
                    evaluation,
                } => {
                    self.on_adjusting(needs, recommendation, evaluation, &mut context)
                        .await
                }
            };

            if cancel.is_cancelled() && !matches!(state, RefinementState::Stopped(_)) {
                info!(iteration = context.cycles, "refinement cancelled");
                let needs = context
                    .latest_needs
                    .clone()
                    .unwrap_or_else(|| Needs::fallback(&PartialNeeds::default()));
                state = RefinementState::Stopped(context.finish(StopReason::Cancelled, &needs));
            }
        }
    }

    async fn on_building(&self, needs: Needs, context: &mut LoopContext) -> RefinementState {
        context.latest_needs = Some(needs.clone());

        let tickets = match self.supplier.supply(&needs).await {
            Ok(tickets) => tickets,
            Err(err) => {
                warn!(error = %err, iteration = context.cycles, "candidate sourcing failed");
                let mut outcome = context.finish(StopReason::SourcingFailed, &needs);
                outcome
                    .recommendation
                    .note("sourcing_error", Value::String(err.to_string()));
                return RefinementState::Stopped(outcome);
            }
        };

        if tickets.is_empty() && context.best.is_none() {
            return RefinementState::Stopped(context.finish(StopReason::SourcingEmpty, &needs));
        }

        info!(
            candidates = tickets.len(),
            iteration = context.cycles,
            "building recommendation"
        );
        let recommendation = self.build(&needs, &tickets, &context.query, &context.settings);
        RefinementState::Evaluating {
            needs,
            recommendation,
        }
    }

    async fn on_evaluating(
        &self,
        needs: Needs,
        mut recommendation: Recommendation,
        context: &mut LoopContext,
    ) -> RefinementState {
        let evaluation = self.evaluator.evaluate(&recommendation, &needs).await;
        recommendation.scores = evaluation.scores;
        context.remember(&recommendation, &needs);

        let overall = evaluation.scores.overall;
        if overall >= context.settings.score_threshold {
            info!(overall, threshold = context.settings.score_threshold, "quality threshold met");
            return RefinementState::Stopped(context.finish(StopReason::ThresholdMet, &needs));
        }
        if context.cycles >= context.settings.max_iterations {
            info!(
                overall,
                iterations = context.cycles,
                "iteration budget exhausted, returning best recommendation"
            );
            return RefinementState::Stopped(
                context.finish(StopReason::IterationBudgetExhausted, &needs),
            );
        }

        RefinementState::Adjusting {
            needs,
            recommendation,
            evaluation,
        }
    }

    async fn on_adjusting(
        &self,
        needs: Needs,
        mut recommendation: Recommendation,
        evaluation: Evaluation,
        context: &mut LoopContext,
    ) -> RefinementState {
        recommendation.set_status(RecommendationStatus::Refined);

        let adjustments = match self
            .reflector
            .reflect(&needs, &evaluation.scores, &evaluation.directives)
            .await
        {
            Ok(adjustments) => adjustments,
            Err(err) => {
                warn!(error = %err, "reflection failed, continuing without adjustments");
                AdjustmentMap::new()
            }
        };

        let report = apply_adjustments(&needs, &adjustments);
        context.cycles += 1;
        info!(
            iteration = context.cycles,
            applied = report.applied.len(),
            ignored = report.ignored.len(),
            "applied reflection adjustments"
        );

        let feedback = reflection_feedback(
            context.cycles,
            &needs,
            &evaluation,
            &report,
            recommendation.options.len(),
        );
        context.history.push(feedback);

        RefinementState::Building {
            needs: report.needs,
        }
    }
}

fn reflection_feedback(
    iteration: u32,
    needs: &Needs,
    evaluation: &Evaluation,
    report: &AdjustmentReport,
    option_count: usize,
) -> ReflectionFeedback {
    let scores = &evaluation.scores;
    let mut strengths = Vec::new();
    if scores.needs_match >= STRENGTH_THRESHOLD {
        strengths.push("options closely match the traveler's core needs".to_string());
    }
    if scores.completeness >= STRENGTH_THRESHOLD {
        strengths.push("a broad and varied set of choices was offered".to_string());
    }
    if scores.practicality >= STRENGTH_THRESHOLD {
        strengths.push("options are practical and easy to book".to_string());
    }

    let weaknesses = evaluation
        .directives
        .iter()
        .filter_map(|directive| directive.weakness())
        .collect();

    ReflectionFeedback {
        reflection_id: Uuid::new_v4().to_string(),
        iteration,
        strengths,
        weaknesses,
        improvement_suggestions: evaluation.directives.clone(),
        adjusted_parameters: report.applied.clone(),
        ignored_parameters: report.ignored.clone(),
        needs: needs.clone(),
        scores: evaluation.scores,
        option_count,
        created_at: Utc::now(),
    }
}
