use std::collections::BTreeSet;

use chrono::Timelike;

use super::super::domain::{Needs, Recommendation, RecommendationOption, TransportMode};

const TOP_OPTIONS: usize = 3;
const FLIGHT_REASONABLE_MINUTES: u32 = 240;
const TRAIN_REASONABLE_MINUTES: u32 = 480;

fn top_options(recommendation: &Recommendation) -> &[RecommendationOption] {
    let end = recommendation.options.len().min(TOP_OPTIONS);
    &recommendation.options[..end]
}

/// How well the top three options reflect the stated needs. Base 80.
pub(crate) fn needs_match(recommendation: &Recommendation, needs: &Needs) -> f64 {
    let top = top_options(recommendation);
    let mut score: f64 = 80.0;

    if top.iter().any(|option| needs.prefers_mode(option.ticket.mode)) {
        score += 5.0;
    } else {
        score -= 10.0;
    }

    if needs.has_seat_preference() {
        if top
            .iter()
            .any(|option| needs.accepts_seat(option.ticket.seat_class))
        {
            score += 5.0;
        } else {
            score -= 5.0;
        }
    }

    if let Some(max) = needs.budget.ceiling() {
        if top.iter().all(|option| option.ticket.price <= max) {
            score += 10.0;
        } else {
            score -= 15.0;
        }
    }

    if needs.departure_window.bounds().is_some() {
        if top
            .iter()
            .any(|option| needs.departure_window.contains(option.ticket.departure_time))
        {
            score += 10.0;
        } else {
            score -= 15.0;
        }
    }

    score.clamp(0.0, 100.0)
}

/// Breadth and variety of the whole option list. Base 75.
pub(crate) fn completeness(recommendation: &Recommendation) -> f64 {
    let options = &recommendation.options;
    let mut score: f64 = 75.0;

    match options.len() {
        0 => return 0.0,
        1 => score -= 10.0,
        2 => {}
        3 | 4 => score += 5.0,
        _ => score += 10.0,
    }

    let modes: BTreeSet<TransportMode> = options.iter().map(|option| option.ticket.mode).collect();
    score += (modes.len() as f64 * 5.0).min(10.0);

    if options.len() > 1 {
        let prices: Vec<f64> = options.iter().map(|option| option.ticket.price).collect();
        let max = prices.iter().copied().fold(f64::MIN, f64::max);
        let min = prices.iter().copied().fold(f64::MAX, f64::min);
        let mean = prices.iter().sum::<f64>() / prices.len() as f64;
        let spread = max - min;
        if spread > 0.0 && spread <= mean * 0.5 {
            score += 5.0;
        }
    }

    let hours: BTreeSet<u32> = options
        .iter()
        .map(|option| option.ticket.departure_time.hour())
        .collect();
    if hours.len() >= 3 {
        score += 5.0;
    }

    score.clamp(0.0, 100.0)
}

/// Bookability, directness and sensible journey times. Base 70.
pub(crate) fn practicality(recommendation: &Recommendation, needs: &Needs) -> f64 {
    let options = &recommendation.options;
    let mut score: f64 = 70.0;

    let available = available_count(options);
    if available == 0 {
        score -= 50.0;
    } else {
        score += 10.0 * available as f64 / options.len() as f64;
    }

    if direct_count(options) > 0 {
        score += 10.0;
    }

    let reasonable = options
        .iter()
        .filter(|option| has_reasonable_duration(option, needs))
        .count();
    score += (reasonable as f64 * 5.0).min(15.0);

    score.clamp(0.0, 100.0)
}

pub(crate) fn available_count(options: &[RecommendationOption]) -> usize {
    options
        .iter()
        .filter(|option| option.ticket.available_seats > 0)
        .count()
}

pub(crate) fn direct_count(options: &[RecommendationOption]) -> usize {
    options
        .iter()
        .filter(|option| option.ticket.is_direct())
        .count()
}

fn has_reasonable_duration(option: &RecommendationOption, needs: &Needs) -> bool {
    let minutes = option.ticket.duration_minutes;
    match needs.max_duration_minutes {
        Some(max) => minutes <= max,
        None => match option.ticket.mode {
            TransportMode::Flight => minutes <= FLIGHT_REASONABLE_MINUTES,
            TransportMode::Train => minutes <= TRAIN_REASONABLE_MINUTES,
            TransportMode::Bus | TransportMode::Ship => false,
        },
    }
}
