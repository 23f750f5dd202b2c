use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::workflows::recommendation::adjust::AdjustmentMap;
use crate::workflows::recommendation::capabilities::{
    CandidateSupplier, ExtractionError, JudgmentError, NeedsExtractor, QualityJudge,
    ReflectError, Reflector, SourcingError,
};
use crate::workflows::recommendation::controller::{
    CancellationFlag, RefinementController, RefinementSettings,
};
use crate::workflows::recommendation::domain::{
    ImprovementDirective, Needs, PartialNeeds, QualityScore, Recommendation, RecommendationId,
    SeatClass, Ticket, TimePreference, TransferStop, TransportMode,
};
use crate::workflows::recommendation::quality::{JudgeVerdict, QualityEvaluator};
use crate::workflows::recommendation::repository::{
    RecommendationStore, StoreError, StoredRecommendation,
};
use crate::workflows::recommendation::service::RecommendationService;

pub(super) fn travel_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
}

pub(super) fn at(hour: u32, minute: u32) -> NaiveDateTime {
    travel_day()
        .and_hms_opt(hour, minute, 0)
        .expect("valid time")
}

pub(super) fn ticket(id: &str, mode: TransportMode, price: f64, seats: u32) -> Ticket {
    let departure = at(8, 0);
    let duration_minutes = match mode {
        TransportMode::Flight => 130,
        _ => 300,
    };
    Ticket {
        id: id.to_string(),
        mode,
        departure_city: "Beijing".to_string(),
        departure_station: "Beijing South".to_string(),
        departure_time: departure,
        arrival_city: "Shanghai".to_string(),
        arrival_station: "Shanghai Hongqiao".to_string(),
        arrival_time: departure + chrono::Duration::minutes(i64::from(duration_minutes)),
        price,
        seat_class: match mode {
            TransportMode::Flight => SeatClass::Economy,
            _ => SeatClass::HighSpeedSecond,
        },
        available_seats: seats,
        operator: "China Railway".to_string(),
        vehicle_number: format!("G{id}"),
        duration_minutes,
        transfers: None,
        extras: None,
    }
}

pub(super) fn train(id: &str, price: f64, seats: u32) -> Ticket {
    ticket(id, TransportMode::Train, price, seats)
}

pub(super) fn departing(mut ticket: Ticket, hour: u32, minute: u32) -> Ticket {
    ticket.departure_time = at(hour, minute);
    ticket.arrival_time =
        ticket.departure_time + chrono::Duration::minutes(i64::from(ticket.duration_minutes));
    ticket
}

pub(super) fn with_transfer(mut ticket: Ticket) -> Ticket {
    ticket.transfers = Some(vec![TransferStop {
        station: "Nanjing South".to_string(),
        arrival: ticket.departure_time + chrono::Duration::minutes(120),
        departure: ticket.departure_time + chrono::Duration::minutes(140),
    }]);
    ticket
}

/// Beijing to Shanghai by train under 1000 in the morning.
pub(super) fn scenario_needs() -> Needs {
    let mut needs = Needs::new("Beijing", "Shanghai");
    needs.preferred_modes = vec![TransportMode::Train];
    needs.budget.max_price = Some(1000.0);
    needs.departure_window.preferred_time = Some(TimePreference::Morning);
    needs
}

pub(super) fn scenario_tickets() -> Vec<Ticket> {
    [600.0, 900.0, 1200.0, 1500.0, 800.0]
        .into_iter()
        .zip([10, 0, 5, 20, 3])
        .enumerate()
        .map(|(index, (price, seats))| train(&format!("T{index}"), price, seats))
        .collect()
}

/// Five varied, bookable options across both modes and several departure hours.
pub(super) fn varied_tickets() -> Vec<Ticket> {
    vec![
        departing(train("V1", 550.0, 20), 7, 0),
        departing(train("V2", 620.0, 12), 9, 30),
        departing(ticket("V3", TransportMode::Flight, 700.0, 8), 12, 0),
        departing(train("V4", 580.0, 15), 15, 0),
        departing(ticket("V5", TransportMode::Flight, 680.0, 9), 18, 0),
    ]
}

pub(super) fn settings(max_iterations: u32, score_threshold: f64) -> RefinementSettings {
    RefinementSettings::new(max_iterations, score_threshold)
}

pub(super) struct FixedExtractor {
    result: Result<Needs, PartialNeeds>,
}

impl FixedExtractor {
    pub(super) fn returning(needs: Needs) -> Self {
        Self { result: Ok(needs) }
    }

    pub(super) fn failing(partial: PartialNeeds) -> Self {
        Self {
            result: Err(partial),
        }
    }
}

#[async_trait]
impl NeedsExtractor for FixedExtractor {
    async fn extract(&self, _text: &str) -> Result<Needs, ExtractionError> {
        self.result
            .clone()
            .map_err(|partial| ExtractionError::new("unusable text", partial))
    }
}

pub(super) struct PanickingExtractor;

#[async_trait]
impl NeedsExtractor for PanickingExtractor {
    async fn extract(&self, _text: &str) -> Result<Needs, ExtractionError> {
        panic!("extractor exploded")
    }
}

/// Replays queued responses, then repeats the fallback ticket set.
#[derive(Default)]
pub(super) struct SequenceSupplier {
    queued: Mutex<VecDeque<Result<Vec<Ticket>, String>>>,
    fallback: Vec<Ticket>,
    seen: Mutex<Vec<Needs>>,
    cancel_after: Option<(usize, CancellationFlag)>,
}

impl SequenceSupplier {
    pub(super) fn always(tickets: Vec<Ticket>) -> Self {
        Self {
            fallback: tickets,
            ..Self::default()
        }
    }

    pub(super) fn then(self, response: Result<Vec<Ticket>, &str>) -> Self {
        self.queued
            .lock()
            .expect("supplier mutex poisoned")
            .push_back(response.map_err(str::to_string));
        self
    }

    pub(super) fn cancelling_after(mut self, calls: usize, flag: CancellationFlag) -> Self {
        self.cancel_after = Some((calls, flag));
        self
    }

    pub(super) fn calls(&self) -> usize {
        self.seen.lock().expect("supplier mutex poisoned").len()
    }

    pub(super) fn seen(&self) -> Vec<Needs> {
        self.seen.lock().expect("supplier mutex poisoned").clone()
    }
}

#[async_trait]
impl CandidateSupplier for SequenceSupplier {
    async fn supply(&self, needs: &Needs) -> Result<Vec<Ticket>, SourcingError> {
        let calls = {
            let mut seen = self.seen.lock().expect("supplier mutex poisoned");
            seen.push(needs.clone());
            seen.len()
        };
        if let Some((after, flag)) = &self.cancel_after {
            if calls >= *after {
                flag.cancel();
            }
        }

        let queued = self
            .queued
            .lock()
            .expect("supplier mutex poisoned")
            .pop_front();
        match queued {
            Some(Ok(tickets)) => Ok(tickets),
            Some(Err(reason)) => Err(SourcingError::Unavailable(reason)),
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Judge returning queued overall scores, repeating the last one.
pub(super) struct FixedJudge {
    scores: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
    suggestion: String,
    pub(super) calls: AtomicUsize,
}

impl FixedJudge {
    pub(super) fn scoring(scores: &[f64]) -> Self {
        Self::suggesting(scores, "Offer cheaper options within budget")
    }

    pub(super) fn suggesting(scores: &[f64], suggestion: &str) -> Self {
        Self {
            scores: Mutex::new(scores.iter().copied().collect()),
            last: Mutex::new(scores.last().copied().unwrap_or(0.0)),
            suggestion: suggestion.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QualityJudge for FixedJudge {
    async fn judge(
        &self,
        _recommendation: &Recommendation,
        _needs: &Needs,
    ) -> Result<JudgeVerdict, JudgmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let overall = {
            let mut scores = self.scores.lock().expect("judge mutex poisoned");
            let mut last = self.last.lock().expect("judge mutex poisoned");
            if let Some(next) = scores.pop_front() {
                *last = next;
            }
            *last
        };
        Ok(JudgeVerdict {
            needs_match: overall,
            completeness: overall,
            practicality: overall,
            overall: Some(overall),
            is_sufficient: Some(false),
            suggestions: vec![self.suggestion.clone()],
        })
    }
}

pub(super) struct FailingJudge {
    pub(super) malformed: bool,
}

#[async_trait]
impl QualityJudge for FailingJudge {
    async fn judge(
        &self,
        _recommendation: &Recommendation,
        _needs: &Needs,
    ) -> Result<JudgeVerdict, JudgmentError> {
        if self.malformed {
            JudgeVerdict::parse("the options look fine to me")
        } else {
            Err(JudgmentError::Unavailable("judge offline".to_string()))
        }
    }
}

/// Records every reflection request and answers with a fixed adjustment map.
#[derive(Default)]
pub(super) struct RecordingReflector {
    adjustments: AdjustmentMap,
    fail: bool,
    pub(super) calls: Mutex<Vec<(Needs, QualityScore, Vec<ImprovementDirective>)>>,
}

impl RecordingReflector {
    pub(super) fn adjusting(adjustments: AdjustmentMap) -> Self {
        Self {
            adjustments,
            ..Self::default()
        }
    }

    pub(super) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(super) fn call_count(&self) -> usize {
        self.calls.lock().expect("reflector mutex poisoned").len()
    }
}

#[async_trait]
impl Reflector for RecordingReflector {
    async fn reflect(
        &self,
        needs: &Needs,
        scores: &QualityScore,
        directives: &[ImprovementDirective],
    ) -> Result<AdjustmentMap, ReflectError> {
        self.calls
            .lock()
            .expect("reflector mutex poisoned")
            .push((needs.clone(), *scores, directives.to_vec()));
        if self.fail {
            return Err(ReflectError::Malformed("not a map".to_string()));
        }
        Ok(self.adjustments.clone())
    }
}

pub(super) fn adjustments(entries: &[(&str, Value)]) -> AdjustmentMap {
    entries
        .iter()
        .map(|(path, value)| (path.to_string(), value.clone()))
        .collect()
}

pub(super) fn controller(
    extractor: Arc<dyn NeedsExtractor>,
    supplier: Arc<dyn CandidateSupplier>,
    reflector: Arc<dyn Reflector>,
    evaluator: QualityEvaluator,
) -> RefinementController {
    RefinementController::new(extractor, supplier, reflector, evaluator)
}

/// Controller over the scenario needs with rule-based evaluation.
pub(super) fn rule_controller(
    supplier: Arc<SequenceSupplier>,
    reflector: Arc<RecordingReflector>,
) -> RefinementController {
    controller(
        Arc::new(FixedExtractor::returning(scenario_needs())),
        supplier,
        reflector,
        QualityEvaluator::rule_based(),
    )
}

/// Controller whose evaluator always answers with the given overall scores.
pub(super) fn judged_controller(
    scores: &[f64],
    supplier: Arc<SequenceSupplier>,
    reflector: Arc<RecordingReflector>,
) -> RefinementController {
    controller(
        Arc::new(FixedExtractor::returning(scenario_needs())),
        supplier,
        reflector,
        QualityEvaluator::with_judge(Arc::new(FixedJudge::scoring(scores))),
    )
}

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    pub(super) records: Arc<Mutex<HashMap<RecommendationId, StoredRecommendation>>>,
}

impl RecommendationStore for MemoryStore {
    fn insert(&self, record: StoredRecommendation) -> Result<StoredRecommendation, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        if guard.contains_key(record.id()) {
            return Err(StoreError::Conflict);
        }
        guard.insert(record.id().clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: StoredRecommendation) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        guard.insert(record.id().clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &RecommendationId) -> Result<Option<StoredRecommendation>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

pub(super) struct UnavailableStore;

impl RecommendationStore for UnavailableStore {
    fn insert(&self, _record: StoredRecommendation) -> Result<StoredRecommendation, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: StoredRecommendation) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &RecommendationId) -> Result<Option<StoredRecommendation>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn build_service(
    controller: RefinementController,
) -> (RecommendationService<MemoryStore>, MemoryStore) {
    let store = MemoryStore::default();
    let service = RecommendationService::new(
        Arc::new(controller),
        Arc::new(store.clone()),
        RefinementSettings::default(),
    );
    (service, store)
}

/// Service over varied tickets that reaches the default threshold on the first pass.
pub(super) fn scenario_service() -> (RecommendationService<MemoryStore>, MemoryStore) {
    build_service(rule_controller(
        Arc::new(SequenceSupplier::always(varied_tickets())),
        Arc::new(RecordingReflector::default()),
    ))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
