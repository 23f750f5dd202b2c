//! Offline needs extraction from conversational text.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use super::capabilities::{ExtractionError, NeedsExtractor};
use super::domain::{
    Needs, PartialNeeds, PriceLevel, SeatClass, TimePreference, TimeWindow, TransportMode,
    TravelPriority,
};

const KNOWN_CITIES: [&str; 12] = [
    "Beijing",
    "Shanghai",
    "Guangzhou",
    "Shenzhen",
    "Chengdu",
    "Hangzhou",
    "Wuhan",
    "Xi'an",
    "Nanjing",
    "Chongqing",
    "Tianjin",
    "Xiamen",
];

const BUDGET_MARKERS: [&str; 7] = ["under", "below", "within", "max", "budget", "than", "upto"];

/// Reads cities, modes, time of day, budget and seat tiers from keywords.
///
/// Cities come from `from X to Y` phrasing or, failing that, the first two known cities in
/// order of appearance. Without both cities the extraction fails and reports what it found.
#[derive(Debug, Clone, Default)]
pub struct KeywordNeedsExtractor {
    user_id: Option<String>,
}

impl KeywordNeedsExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    /// Synchronous parse shared by the async capability.
    pub fn parse(&self, text: &str) -> Result<Needs, ExtractionError> {
        let words = tokenize(text);
        let lowered: Vec<String> = words.iter().map(|word| word.to_lowercase()).collect();

        let (departure, arrival) = cities(&words, &lowered);
        let modes = modes(&lowered);
        let max_price = max_price(&lowered);

        let (Some(departure_city), Some(arrival_city)) = (departure.clone(), arrival.clone())
        else {
            return Err(ExtractionError::new(
                "departure or arrival city not recognised",
                PartialNeeds {
                    user_id: self.user_id.clone(),
                    departure_city: departure,
                    arrival_city: arrival,
                    preferred_modes: modes,
                    max_price,
                },
            ));
        };

        let mut needs = Needs::new(departure_city, arrival_city);
        needs.user_id = self.user_id.clone();
        if !modes.is_empty() {
            needs.preferred_modes = modes;
        }
        needs.departure_window = departure_window(&lowered);
        needs.budget.max_price = max_price;
        needs.budget.price_level = price_level(&lowered);
        needs.preferred_seat_classes = seat_classes(&lowered);

        if contains_any(&lowered, &["direct", "nonstop", "non-stop"]) {
            needs.max_transfers = Some(0);
        }

        let mut priorities = Vec::new();
        if contains_any(&lowered, &["cheap", "cheapest", "affordable", "budget"]) {
            priorities.push(TravelPriority::Price);
        }
        if contains_any(&lowered, &["fast", "fastest", "quick", "quickest", "urgent"]) {
            priorities.push(TravelPriority::Time);
        }
        if contains_any(&lowered, &["comfortable", "comfort", "relaxing"]) {
            priorities.push(TravelPriority::Comfort);
        }
        if !priorities.is_empty() {
            needs.priorities = priorities;
        }

        Ok(needs.normalized())
    }
}

#[async_trait]
impl NeedsExtractor for KeywordNeedsExtractor {
    async fn extract(&self, text: &str) -> Result<Needs, ExtractionError> {
        self.parse(text)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| ch.is_whitespace() || matches!(ch, ',' | '.' | '!' | '?' | ';'))
        .map(|word| word.trim_matches(|ch: char| matches!(ch, '"' | '(' | ')')))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn known_city(word: &str) -> Option<&'static str> {
    KNOWN_CITIES
        .iter()
        .copied()
        .find(|city| city.eq_ignore_ascii_case(word))
}

fn capitalised(word: &str) -> Option<String> {
    let first = word.chars().next()?;
    first
        .is_uppercase()
        .then(|| word.trim_end_matches(|ch: char| !ch.is_alphanumeric()).to_string())
}

/// City named right after the first occurrence of `marker` that is followed by one.
fn city_after(words: &[String], lowered: &[String], marker: &str) -> Option<String> {
    lowered
        .iter()
        .enumerate()
        .filter(|(_, word)| *word == marker)
        .find_map(|(index, _)| {
            let next = words.get(index + 1)?;
            known_city(next)
                .map(str::to_string)
                .or_else(|| capitalised(next))
        })
}

fn cities(words: &[String], lowered: &[String]) -> (Option<String>, Option<String>) {
    let mut departure = city_after(words, lowered, "from");
    let mut arrival = city_after(words, lowered, "to");

    let mentioned: Vec<&'static str> = words.iter().filter_map(|word| known_city(word)).collect();
    if departure.is_none() {
        departure = mentioned
            .iter()
            .find(|city| arrival.as_deref() != Some(**city))
            .map(|city| city.to_string());
    }
    if arrival.is_none() {
        arrival = mentioned
            .iter()
            .find(|city| departure.as_deref() != Some(**city))
            .map(|city| city.to_string());
    }
    (departure, arrival)
}

fn contains_any(lowered: &[String], keywords: &[&str]) -> bool {
    lowered
        .iter()
        .any(|word| keywords.contains(&word.as_str()))
}

fn modes(lowered: &[String]) -> Vec<TransportMode> {
    let mut modes = Vec::new();
    let mut push = |mode| {
        if !modes.contains(&mode) {
            modes.push(mode);
        }
    };
    for word in lowered {
        match word.as_str() {
            "fly" | "flight" | "flights" | "plane" | "airplane" => push(TransportMode::Flight),
            "train" | "trains" | "rail" | "railway" | "high-speed" => push(TransportMode::Train),
            "bus" | "coach" => push(TransportMode::Bus),
            "ship" | "ferry" | "boat" => push(TransportMode::Ship),
            _ => {}
        }
    }
    modes
}

fn time_preference(lowered: &[String]) -> Option<TimePreference> {
    lowered.iter().find_map(|word| match word.as_str() {
        "morning" => Some(TimePreference::Morning),
        "afternoon" | "noon" => Some(TimePreference::Afternoon),
        "evening" => Some(TimePreference::Evening),
        "night" | "overnight" | "late" => Some(TimePreference::Night),
        "anytime" => Some(TimePreference::Any),
        _ => None,
    })
}

fn departure_window(lowered: &[String]) -> TimeWindow {
    let mut window = TimeWindow {
        preferred_time: time_preference(lowered),
        ..TimeWindow::default()
    };

    let date = lowered
        .iter()
        .find_map(|word| NaiveDate::parse_from_str(word, "%Y-%m-%d").ok());
    if let Some(date) = date {
        window.start = Some(date.and_time(NaiveTime::MIN));
        window.end = NaiveTime::from_hms_opt(23, 59, 59).map(|end| date.and_time(end));
    }

    if contains_any(lowered, &["flexible", "flexibly"]) {
        window.flexible_hours = Some(2);
    }
    window
}

fn amount(word: &str) -> Option<f64> {
    let digits = word
        .trim_start_matches(['¥', '$'])
        .trim_end_matches("yuan")
        .trim_end_matches("rmb")
        .replace(',', "");
    digits.parse::<f64>().ok().filter(|value| *value > 0.0)
}

fn max_price(lowered: &[String]) -> Option<f64> {
    lowered.iter().enumerate().find_map(|(index, word)| {
        if !BUDGET_MARKERS.contains(&word.as_str()) {
            return None;
        }
        lowered
            .iter()
            .skip(index + 1)
            .take(2)
            .find_map(|candidate| amount(candidate))
    })
}

fn price_level(lowered: &[String]) -> PriceLevel {
    if contains_any(lowered, &["luxury", "luxurious"]) {
        PriceLevel::Luxury
    } else if contains_any(lowered, &["premium"]) {
        PriceLevel::Premium
    } else if contains_any(lowered, &["cheap", "cheapest", "economical"]) {
        PriceLevel::Economy
    } else {
        PriceLevel::Any
    }
}

fn seat_classes(lowered: &[String]) -> Option<Vec<SeatClass>> {
    let mut classes = Vec::new();
    for pair in lowered.windows(2) {
        let class = match (pair[0].as_str(), pair[1].as_str()) {
            ("business", "class") => Some(SeatClass::Business),
            ("first", "class") => Some(SeatClass::First),
            ("economy", _) => Some(SeatClass::Economy),
            ("soft", "sleeper") => Some(SeatClass::SoftSleeper),
            ("hard", "sleeper") => Some(SeatClass::HardSleeper),
            ("soft", "seat") => Some(SeatClass::SoftSeat),
            ("hard", "seat") => Some(SeatClass::HardSeat),
            ("second", "class") => Some(SeatClass::HighSpeedSecond),
            _ => None,
        };
        if let Some(class) = class {
            if !classes.contains(&class) {
                classes.push(class);
            }
        }
    }
    if lowered.last().map(String::as_str) == Some("economy") && !classes.contains(&SeatClass::Economy) {
        classes.push(SeatClass::Economy);
    }
    (!classes.is_empty()).then_some(classes)
}
