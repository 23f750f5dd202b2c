//! Best-effort merge of sparse dotted-path adjustments onto a copy of the needs.
//!
//! Paths are resolved against a fixed registry of adjustable fields rather than by
//! reflection. A path that names nothing in the registry, or that passes through an absent
//! optional section, leaves the needs untouched and is reported as ignored.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::domain::{Budget, Needs, TimeWindow};

/// Sparse map from dotted field path to replacement value.
pub type AdjustmentMap = BTreeMap<String, Value>;

/// Field inside a departure or return window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowField {
    Whole,
    Start,
    End,
    FlexibleHours,
    PreferredTime,
}

/// Every field the refinement step may rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustablePath {
    UserId,
    DepartureCity,
    ArrivalCity,
    DepartureWindow(WindowField),
    ReturnWindow(WindowField),
    PreferredModes,
    PreferredSeatClasses,
    Budget,
    BudgetMin,
    BudgetMax,
    BudgetTarget,
    BudgetPriceLevel,
    Priorities,
    MaxTransfers,
    MaxDurationMinutes,
}

impl AdjustablePath {
    /// Resolves a dotted path. Accepts the legacy field names used by upstream reflectors.
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.trim().split('.').collect();
        match segments.as_slice() {
            ["user_id"] => Some(Self::UserId),
            ["departure_city"] => Some(Self::DepartureCity),
            ["arrival_city"] => Some(Self::ArrivalCity),
            ["preferred_modes"] | ["preferred_transport_types"] => Some(Self::PreferredModes),
            ["preferred_seat_classes"] => Some(Self::PreferredSeatClasses),
            ["priorities"] => Some(Self::Priorities),
            ["max_transfers"] => Some(Self::MaxTransfers),
            ["max_duration_minutes"] => Some(Self::MaxDurationMinutes),
            ["budget"] => Some(Self::Budget),
            ["budget", field] => match *field {
                "min_price" => Some(Self::BudgetMin),
                "max_price" => Some(Self::BudgetMax),
                "target_price" => Some(Self::BudgetTarget),
                "price_level" => Some(Self::BudgetPriceLevel),
                _ => None,
            },
            ["departure_window" | "departure_time_range", rest @ ..] => {
                window_field(rest).map(Self::DepartureWindow)
            }
            ["return_window" | "return_time_range", rest @ ..] => {
                window_field(rest).map(Self::ReturnWindow)
            }
            _ => None,
        }
    }

    fn apply(self, needs: &mut Needs, value: &Value) -> Result<(), AdjustmentError> {
        match self {
            Self::UserId => needs.user_id = decode(value)?,
            Self::DepartureCity => needs.departure_city = non_empty_text(value)?,
            Self::ArrivalCity => needs.arrival_city = non_empty_text(value)?,
            Self::DepartureWindow(field) => set_window(&mut needs.departure_window, field, value)?,
            Self::ReturnWindow(WindowField::Whole) => needs.return_window = decode(value)?,
            Self::ReturnWindow(field) => match needs.return_window.as_mut() {
                Some(window) => set_window(window, field, value)?,
                None => return Err(AdjustmentError::MissingSection("return_window")),
            },
            Self::PreferredModes => needs.preferred_modes = one_or_many(value)?,
            Self::PreferredSeatClasses => {
                needs.preferred_seat_classes = if value.is_null() {
                    None
                } else {
                    Some(one_or_many(value)?)
                }
            }
            Self::Budget => needs.budget = decode::<Budget>(value)?,
            Self::BudgetMin => needs.budget.min_price = optional_number(value)?,
            Self::BudgetMax => needs.budget.max_price = optional_number(value)?,
            Self::BudgetTarget => needs.budget.target_price = optional_number(value)?,
            Self::BudgetPriceLevel => needs.budget.price_level = decode(value)?,
            Self::Priorities => needs.priorities = one_or_many(value)?,
            Self::MaxTransfers => needs.max_transfers = optional_count(value)?,
            Self::MaxDurationMinutes => needs.max_duration_minutes = optional_count(value)?,
        }
        Ok(())
    }
}

fn window_field(rest: &[&str]) -> Option<WindowField> {
    match rest {
        [] => Some(WindowField::Whole),
        ["start" | "start_time"] => Some(WindowField::Start),
        ["end" | "end_time"] => Some(WindowField::End),
        ["flexible_hours"] => Some(WindowField::FlexibleHours),
        ["preferred_time"] => Some(WindowField::PreferredTime),
        _ => None,
    }
}

fn set_window(
    window: &mut TimeWindow,
    field: WindowField,
    value: &Value,
) -> Result<(), AdjustmentError> {
    match field {
        WindowField::Whole => *window = decode(value)?,
        WindowField::Start => window.start = optional_instant(value)?,
        WindowField::End => window.end = optional_instant(value)?,
        WindowField::FlexibleHours => window.flexible_hours = optional_count(value)?,
        WindowField::PreferredTime => window.preferred_time = decode(value)?,
    }
    Ok(())
}

/// Why an adjustment key was skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdjustmentError {
    #[error("no adjustable field at this path")]
    UnknownPath,
    #[error("section `{0}` is absent")]
    MissingSection(&'static str),
    #[error("value rejected: {0}")]
    InvalidValue(String),
}

/// Outcome of merging one adjustment map.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentReport {
    pub needs: Needs,
    pub applied: AdjustmentMap,
    pub ignored: Vec<String>,
}

/// Applies `adjustments` to a copy of `needs`. The input is never modified.
pub fn apply_adjustments(needs: &Needs, adjustments: &AdjustmentMap) -> AdjustmentReport {
    let mut adjusted = needs.clone();
    let mut applied = AdjustmentMap::new();
    let mut ignored = Vec::new();

    for (path, value) in adjustments {
        let outcome = AdjustablePath::parse(path)
            .ok_or(AdjustmentError::UnknownPath)
            .and_then(|target| {
                let mut candidate = adjusted.clone();
                target.apply(&mut candidate, value)?;
                Ok(candidate)
            });

        match outcome {
            Ok(candidate) => {
                adjusted = candidate;
                applied.insert(path.clone(), value.clone());
            }
            Err(reason) => {
                debug!(%path, %reason, "ignoring adjustment");
                ignored.push(path.clone());
            }
        }
    }

    AdjustmentReport {
        needs: adjusted.normalized(),
        applied,
        ignored,
    }
}

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, AdjustmentError> {
    serde_json::from_value(value.clone()).map_err(|err| AdjustmentError::InvalidValue(err.to_string()))
}

fn one_or_many<T: DeserializeOwned>(value: &Value) -> Result<Vec<T>, AdjustmentError> {
    match value {
        Value::Array(_) => decode(value),
        other => decode::<T>(other).map(|item| vec![item]),
    }
}

fn non_empty_text(value: &Value) -> Result<String, AdjustmentError> {
    match value.as_str().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(AdjustmentError::InvalidValue(format!(
            "expected non-empty text, got {value}"
        ))),
    }
}

fn optional_number(value: &Value) -> Result<Option<f64>, AdjustmentError> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .filter(|number| number.is_finite() && *number >= 0.0)
        .map(Some)
        .ok_or_else(|| AdjustmentError::InvalidValue(format!("expected amount, got {value}")))
}

fn optional_count(value: &Value) -> Result<Option<u32>, AdjustmentError> {
    match optional_number(value)? {
        None => Ok(None),
        Some(number) if number <= f64::from(u32::MAX) => Ok(Some(number.round() as u32)),
        Some(_) => Err(AdjustmentError::InvalidValue(format!(
            "count out of range: {value}"
        ))),
    }
}

fn optional_instant(value: &Value) -> Result<Option<NaiveDateTime>, AdjustmentError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<NaiveDateTime>()
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M"))
                .map(Some)
                .map_err(|err| AdjustmentError::InvalidValue(format!("{text}: {err}")))
        }
        other => Err(AdjustmentError::InvalidValue(format!(
            "expected ISO-8601 instant, got {other}"
        ))),
    }
}
