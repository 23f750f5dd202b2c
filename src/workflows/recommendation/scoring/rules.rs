use chrono::NaiveDateTime;

use super::super::domain::{clamp_score, Needs, ScoreFactor, ScoreReason, Ticket};

pub(crate) const TRANSPORT_WEIGHT: f64 = 0.15;
pub(crate) const SEAT_WEIGHT: f64 = 0.10;
pub(crate) const PRICE_WEIGHT: f64 = 0.20;
pub(crate) const DEPARTURE_WEIGHT: f64 = 0.25;
pub(crate) const DURATION_WEIGHT: f64 = 0.15;
pub(crate) const AVAILABILITY_WEIGHT: f64 = 0.15;

/// Scores every factor for one ticket, in a fixed factor order.
pub(crate) fn score_factors(ticket: &Ticket, needs: &Needs) -> Vec<ScoreReason> {
    vec![
        reason(
            ScoreFactor::TransportType,
            "transport mode preference match",
            TRANSPORT_WEIGHT,
            transport_score(ticket, needs),
        ),
        reason(
            ScoreFactor::SeatClass,
            "seat class match",
            SEAT_WEIGHT,
            seat_score(ticket, needs),
        ),
        reason(
            ScoreFactor::Price,
            "price fit within budget",
            PRICE_WEIGHT,
            price_score(ticket.price, needs),
        ),
        reason(
            ScoreFactor::DepartureTime,
            "departure time fit",
            DEPARTURE_WEIGHT,
            departure_score(ticket.departure_time, needs),
        ),
        reason(
            ScoreFactor::Duration,
            "journey duration reasonableness",
            DURATION_WEIGHT,
            duration_score(ticket.duration_minutes, needs),
        ),
        reason(
            ScoreFactor::Availability,
            "seat availability",
            AVAILABILITY_WEIGHT,
            availability_score(ticket.available_seats),
        ),
    ]
}

fn reason(factor: ScoreFactor, description: &str, weight: f64, score: f64) -> ScoreReason {
    ScoreReason {
        factor,
        description: description.to_string(),
        weight,
        score: clamp_score(score),
    }
}

fn transport_score(ticket: &Ticket, needs: &Needs) -> f64 {
    if needs.prefers_mode(ticket.mode) {
        100.0
    } else {
        50.0
    }
}

fn seat_score(ticket: &Ticket, needs: &Needs) -> f64 {
    if needs.accepts_seat(ticket.seat_class) {
        100.0
    } else {
        60.0
    }
}

pub(crate) fn price_score(price: f64, needs: &Needs) -> f64 {
    let mut score = 100.0;
    if let Some(max) = needs.budget.ceiling() {
        if price > max {
            score = (100.0 - (price - max) / max * 100.0).max(0.0);
        }
    }
    if let Some(min) = needs.budget.floor() {
        if price < min {
            score = (100.0 - (min - price) / min * 50.0).max(0.0);
        }
    }
    score
}

pub(crate) fn departure_score(departure: NaiveDateTime, needs: &Needs) -> f64 {
    let Some((start, end)) = needs.departure_window.bounds() else {
        return 100.0;
    };

    let outside = if departure < start {
        start - departure
    } else if departure > end {
        departure - end
    } else {
        return 100.0;
    };

    let hours = outside.num_seconds() as f64 / 3600.0;
    (100.0 - hours * 5.0).max(0.0)
}

pub(crate) fn duration_score(duration_minutes: u32, needs: &Needs) -> f64 {
    match needs.max_duration_minutes {
        Some(max) if duration_minutes > max => {
            let hours_over = f64::from(duration_minutes - max) / 60.0;
            (100.0 - hours_over * 10.0).max(0.0)
        }
        _ => 100.0,
    }
}

pub(crate) fn availability_score(available_seats: u32) -> f64 {
    if available_seats == 0 {
        0.0
    } else {
        (f64::from(available_seats) * 10.0).min(100.0)
    }
}
