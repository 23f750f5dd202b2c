use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use super::ticket::{SeatClass, TransportMode};

/// Categorical time-of-day preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePreference {
    Morning,
    Afternoon,
    Evening,
    Night,
    Any,
}

impl TimePreference {
    pub fn label(self) -> &'static str {
        match self {
            TimePreference::Morning => "morning",
            TimePreference::Afternoon => "afternoon",
            TimePreference::Evening => "evening",
            TimePreference::Night => "night",
            TimePreference::Any => "any",
        }
    }
}

/// Qualitative price tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceLevel {
    Economy,
    Standard,
    Premium,
    Luxury,
    #[default]
    Any,
}

/// Factor the traveler cares about most, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelPriority {
    Price,
    Time,
    Comfort,
    Convenience,
    Reliability,
}

/// Departure or return window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flexible_hours: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<TimePreference>,
}

impl TimeWindow {
    pub fn preferring(preference: TimePreference) -> Self {
        Self {
            preferred_time: Some(preference),
            ..Self::default()
        }
    }

    /// Both bounds, only when the window is fully specified.
    pub fn bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.bounds()
            .map(|(start, end)| start <= instant && instant <= end)
            .unwrap_or(false)
    }
}

/// Spending constraints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Budget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub price_level: PriceLevel,
}

impl Budget {
    /// Ceiling that participates in scoring. Zero or negative ceilings are treated as unset.
    pub fn ceiling(&self) -> Option<f64> {
        self.max_price.filter(|max| *max > 0.0)
    }

    pub fn floor(&self) -> Option<f64> {
        self.min_price.filter(|min| *min > 0.0)
    }
}

/// Structured travel constraints and preferences for one request.
///
/// Values are treated as snapshots: each refinement step derives an adjusted copy instead of
/// editing the one used by the previous iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Needs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub departure_city: String,
    pub arrival_city: String,
    #[serde(default)]
    pub departure_window: TimeWindow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_window: Option<TimeWindow>,
    #[serde(default = "default_modes")]
    pub preferred_modes: Vec<TransportMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_seat_classes: Option<Vec<SeatClass>>,
    #[serde(default)]
    pub budget: Budget,
    #[serde(
        default = "default_priorities",
        deserialize_with = "deserialize_priorities"
    )]
    pub priorities: Vec<TravelPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_transfers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_minutes: Option<u32>,
}

impl Needs {
    pub fn new(departure_city: impl Into<String>, arrival_city: impl Into<String>) -> Self {
        Self {
            user_id: None,
            departure_city: departure_city.into(),
            arrival_city: arrival_city.into(),
            departure_window: TimeWindow::default(),
            return_window: None,
            preferred_modes: default_modes(),
            preferred_seat_classes: None,
            budget: Budget::default(),
            priorities: default_priorities(),
            max_transfers: None,
            max_duration_minutes: None,
        }
    }

    /// Minimal deterministic needs assembled from whatever an extractor managed to read.
    pub fn fallback(partial: &PartialNeeds) -> Self {
        let mut needs = Self::new(
            partial
                .departure_city
                .clone()
                .unwrap_or_else(|| UNSPECIFIED_CITY.to_string()),
            partial
                .arrival_city
                .clone()
                .unwrap_or_else(|| UNSPECIFIED_CITY.to_string()),
        );
        needs.user_id = partial.user_id.clone();
        needs.departure_window = TimeWindow::preferring(TimePreference::Any);
        if !partial.preferred_modes.is_empty() {
            needs.preferred_modes = partial.preferred_modes.clone();
        }
        needs.budget.max_price = partial.max_price;
        needs
    }

    /// Re-establishes invariants after construction or adjustment.
    pub fn normalized(mut self) -> Self {
        if self.priorities.is_empty() {
            self.priorities = default_priorities();
        }
        self
    }

    pub fn prefers_mode(&self, mode: TransportMode) -> bool {
        self.preferred_modes.contains(&mode)
    }

    /// `true` when no seat preference exists or the class is explicitly preferred.
    pub fn accepts_seat(&self, seat_class: SeatClass) -> bool {
        match &self.preferred_seat_classes {
            Some(classes) if !classes.is_empty() => classes.contains(&seat_class),
            _ => true,
        }
    }

    pub fn has_seat_preference(&self) -> bool {
        self.preferred_seat_classes
            .as_ref()
            .map(|classes| !classes.is_empty())
            .unwrap_or(false)
    }
}

pub const UNSPECIFIED_CITY: &str = "unspecified";

/// Fields an extractor could read before giving up.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialNeeds {
    pub user_id: Option<String>,
    pub departure_city: Option<String>,
    pub arrival_city: Option<String>,
    pub preferred_modes: Vec<TransportMode>,
    pub max_price: Option<f64>,
}

fn default_modes() -> Vec<TransportMode> {
    vec![TransportMode::Flight, TransportMode::Train]
}

fn default_priorities() -> Vec<TravelPriority> {
    vec![TravelPriority::Price]
}

fn deserialize_priorities<'de, D>(deserializer: D) -> Result<Vec<TravelPriority>, D::Error>
where
    D: Deserializer<'de>,
{
    let priorities = Option::<Vec<TravelPriority>>::deserialize(deserializer)?.unwrap_or_default();
    if priorities.is_empty() {
        Ok(default_priorities())
    } else {
        Ok(priorities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_priorities_are_coerced_to_price() {
        let needs: Needs = serde_json::from_value(json!({
            "departure_city": "Beijing",
            "arrival_city": "Shanghai",
            "priorities": []
        }))
        .expect("needs deserialize");
        assert_eq!(needs.priorities, vec![TravelPriority::Price]);

        let mut manual = Needs::new("Beijing", "Shanghai");
        manual.priorities.clear();
        assert_eq!(manual.normalized().priorities, vec![TravelPriority::Price]);
    }

    #[test]
    fn null_priorities_are_coerced_to_price() {
        let needs: Needs = serde_json::from_value(json!({
            "departure_city": "Beijing",
            "arrival_city": "Shanghai",
            "priorities": null
        }))
        .expect("needs deserialize");
        assert_eq!(needs.priorities, vec![TravelPriority::Price]);
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let needs: Needs = serde_json::from_value(json!({
            "departure_city": "Guangzhou",
            "arrival_city": "Chengdu"
        }))
        .expect("needs deserialize");
        assert_eq!(
            needs.preferred_modes,
            vec![TransportMode::Flight, TransportMode::Train]
        );
        assert_eq!(needs.budget.price_level, PriceLevel::Any);
        assert!(needs.accepts_seat(SeatClass::Business));
        assert!(!needs.has_seat_preference());
    }

    #[test]
    fn fallback_keeps_partial_fields() {
        let partial = PartialNeeds {
            departure_city: Some("Hangzhou".to_string()),
            max_price: Some(3000.0),
            ..PartialNeeds::default()
        };
        let needs = Needs::fallback(&partial);
        assert_eq!(needs.departure_city, "Hangzhou");
        assert_eq!(needs.arrival_city, UNSPECIFIED_CITY);
        assert_eq!(needs.budget.ceiling(), Some(3000.0));
        assert_eq!(
            needs.departure_window.preferred_time,
            Some(TimePreference::Any)
        );
        assert_eq!(needs, Needs::fallback(&partial));
    }

    #[test]
    fn zero_ceiling_is_ignored() {
        let budget = Budget {
            max_price: Some(0.0),
            ..Budget::default()
        };
        assert_eq!(budget.ceiling(), None);
    }
}
