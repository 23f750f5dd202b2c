//! Offline reflection that maps directive categories onto needs adjustments.

use async_trait::async_trait;
use chrono::Duration;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::adjust::AdjustmentMap;
use super::capabilities::{ReflectError, Reflector};
use super::domain::{
    DirectiveKind, ImprovementDirective, Needs, QualityScore, TransportMode, TravelPriority,
};

const BUDGET_RELAXATION: f64 = 1.1;
const WINDOW_WIDENING_HOURS: i64 = 1;
const FLEXIBILITY_STEP: u32 = 2;

/// Deterministic reflector used when no language model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicReflector;

impl HeuristicReflector {
    pub fn new() -> Self {
        Self
    }

    /// Adjustments for the given directives; later directives overwrite earlier keys.
    pub fn adjustments(&self, needs: &Needs, directives: &[ImprovementDirective]) -> AdjustmentMap {
        let mut adjustments = AdjustmentMap::new();
        for directive in directives {
            let kind = match directive.kind {
                DirectiveKind::External => classify(&directive.message),
                kind => Some(kind),
            };
            if let Some(kind) = kind {
                adjust_for(kind, needs, &mut adjustments);
            }
        }
        adjustments
    }
}

#[async_trait]
impl Reflector for HeuristicReflector {
    async fn reflect(
        &self,
        needs: &Needs,
        scores: &QualityScore,
        directives: &[ImprovementDirective],
    ) -> Result<AdjustmentMap, ReflectError> {
        let adjustments = self.adjustments(needs, directives);
        debug!(
            overall = scores.overall,
            keys = adjustments.len(),
            "heuristic reflection proposed adjustments"
        );
        Ok(adjustments)
    }
}

fn classify(message: &str) -> Option<DirectiveKind> {
    let message = message.to_lowercase();
    if message.contains("budget") || message.contains("price") || message.contains("cheap") {
        Some(DirectiveKind::Budget)
    } else if message.contains("time") || message.contains("departure") {
        Some(DirectiveKind::DepartureTime)
    } else if message.contains("direct") || message.contains("transfer") {
        Some(DirectiveKind::DirectRoutes)
    } else if message.contains("mode") || message.contains("variety") || message.contains("divers") {
        Some(DirectiveKind::Diversity)
    } else {
        None
    }
}

fn insert<T: Serialize>(adjustments: &mut AdjustmentMap, path: &str, value: &T) {
    if let Ok(value) = serde_json::to_value(value) {
        adjustments.insert(path.to_string(), value);
    }
}

fn with_default_modes(needs: &Needs) -> Vec<TransportMode> {
    let mut modes = needs.preferred_modes.clone();
    for mode in [TransportMode::Flight, TransportMode::Train] {
        if !modes.contains(&mode) {
            modes.push(mode);
        }
    }
    modes
}

fn adjust_for(kind: DirectiveKind, needs: &Needs, adjustments: &mut AdjustmentMap) {
    match kind {
        DirectiveKind::NoOptions => {
            adjustments.insert("preferred_seat_classes".to_string(), Value::Null);
            adjustments.insert("max_transfers".to_string(), Value::Null);
            insert(adjustments, "preferred_modes", &with_default_modes(needs));
            widen_departure(needs, adjustments);
        }
        DirectiveKind::CoreNeeds => {
            let mut priorities = vec![TravelPriority::Price];
            priorities.extend(
                needs
                    .priorities
                    .iter()
                    .copied()
                    .filter(|priority| *priority != TravelPriority::Price),
            );
            insert(adjustments, "priorities", &priorities);
        }
        DirectiveKind::Budget => {
            if let Some(max) = needs.budget.ceiling() {
                let relaxed = (max * BUDGET_RELAXATION).round();
                adjustments.insert("budget.max_price".to_string(), json!(relaxed));
            }
        }
        DirectiveKind::DepartureTime => widen_departure(needs, adjustments),
        DirectiveKind::Diversity | DirectiveKind::ModeCoverage => {
            insert(adjustments, "preferred_modes", &with_default_modes(needs));
        }
        DirectiveKind::Availability => {
            if needs.has_seat_preference() {
                adjustments.insert("preferred_seat_classes".to_string(), Value::Null);
            }
        }
        DirectiveKind::DirectRoutes => {
            adjustments.insert("max_transfers".to_string(), json!(0));
        }
        DirectiveKind::Polish
        | DirectiveKind::General
        | DirectiveKind::JudgeFallback
        | DirectiveKind::External => {}
    }
}

fn widen_departure(needs: &Needs, adjustments: &mut AdjustmentMap) {
    match needs.departure_window.bounds() {
        Some((start, end)) => {
            let widening = Duration::hours(WINDOW_WIDENING_HOURS);
            insert(adjustments, "departure_window.start", &(start - widening));
            insert(adjustments, "departure_window.end", &(end + widening));
        }
        None => {
            let hours = needs
                .departure_window
                .flexible_hours
                .unwrap_or(0)
                .saturating_add(FLEXIBILITY_STEP);
            adjustments.insert("departure_window.flexible_hours".to_string(), json!(hours));
        }
    }
}
