//! Deterministic candidate source used by the demo, the CLI and tests.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::capabilities::{CandidateSupplier, SourcingError};
use super::domain::{
    Needs, SeatClass, Ticket, TicketExtras, TimePreference, TimeWindow, TransferStop,
    TransportMode,
};

const FLIGHT_SEATS: [SeatClass; 4] = [
    SeatClass::Economy,
    SeatClass::PremiumEconomy,
    SeatClass::Business,
    SeatClass::First,
];

const TRAIN_SEATS: [SeatClass; 6] = [
    SeatClass::HardSeat,
    SeatClass::SoftSeat,
    SeatClass::HardSleeper,
    SeatClass::SoftSleeper,
    SeatClass::HighSpeedSecond,
    SeatClass::HighSpeedFirst,
];

const AIRLINES: [&str; 5] = ["Air China", "China Eastern", "China Southern", "Hainan", "Xiamen Air"];
const RAIL_OPERATORS: [&str; 4] = ["China Railway", "CR Express", "CR Harmony", "CR Regional"];
const AIRCRAFT: [&str; 4] = ["Boeing 737", "Airbus A320", "Boeing 777", "Airbus A330"];

/// Departure clock times generated for a preferred time of day.
pub fn time_slots(preference: Option<TimePreference>) -> &'static [(u32, u32)] {
    match preference {
        Some(TimePreference::Morning) => &[(6, 0), (8, 30), (10, 0)],
        Some(TimePreference::Afternoon) => &[(12, 0), (14, 0), (16, 0)],
        Some(TimePreference::Evening) => &[(17, 0), (18, 30), (20, 0)],
        Some(TimePreference::Night) => &[(21, 0), (22, 30), (23, 59)],
        _ => &[(8, 0), (12, 0), (16, 0), (20, 0)],
    }
}

/// Departure clock times for a window: the preference slots, plus copies shifted by the
/// flexible hours in both directions while they stay within the day.
pub fn departure_slots(window: &TimeWindow) -> Vec<(u32, u32)> {
    let base = time_slots(window.preferred_time);
    let shift = window.flexible_hours.unwrap_or(0).min(23);

    let mut slots = base.to_vec();
    if shift > 0 {
        for &(hour, minute) in base {
            if hour >= shift {
                slots.push((hour - shift, minute));
            }
            if hour + shift < 24 {
                slots.push((hour + shift, minute));
            }
        }
    }
    slots.sort_unstable();
    slots.dedup();
    slots
}

/// Relative price of a seat tier against the economy or hard seat base fare.
pub fn price_multiplier(seat_class: SeatClass) -> f64 {
    match seat_class {
        SeatClass::Economy | SeatClass::HardSeat => 1.0,
        SeatClass::PremiumEconomy => 1.5,
        SeatClass::Business => 3.0,
        SeatClass::First => 5.0,
        SeatClass::SoftSeat => 1.3,
        SeatClass::HardSleeper => 1.8,
        SeatClass::SoftSleeper => 2.5,
        SeatClass::Standing => 0.8,
        SeatClass::HighSpeedSecond => 2.0,
        SeatClass::HighSpeedFirst => 2.8,
        SeatClass::HighSpeedBusiness => 3.5,
    }
}

struct ModeProfile {
    duration_minutes: (u32, u32),
    seats: &'static [SeatClass],
    operators: &'static [&'static str],
    base_fare: f64,
    fare_bounds: (f64, f64),
}

fn profile(mode: TransportMode) -> Option<ModeProfile> {
    match mode {
        TransportMode::Flight => Some(ModeProfile {
            duration_minutes: (60, 240),
            seats: &FLIGHT_SEATS,
            operators: &AIRLINES,
            base_fare: 500.0,
            fare_bounds: (300.0, 3000.0),
        }),
        TransportMode::Train => Some(ModeProfile {
            duration_minutes: (120, 480),
            seats: &TRAIN_SEATS,
            operators: &RAIL_OPERATORS,
            base_fare: 200.0,
            fare_bounds: (100.0, 1000.0),
        }),
        TransportMode::Bus | TransportMode::Ship => None,
    }
}

/// Seeded generator of plausible flight and train offers.
///
/// Every call draws from a fresh generator derived from the seed and a call counter, so a
/// supplier built with the same seed replays the same sequence of candidate sets.
#[derive(Debug)]
pub struct MockCandidateSupplier {
    seed: u64,
    anchor: NaiveDate,
    days: u32,
    calls: AtomicU64,
}

impl MockCandidateSupplier {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            anchor: Utc::now().date_naive(),
            days: 3,
            calls: AtomicU64::new(0),
        }
    }

    /// Fixes the first travel date used when the needs carry no start instant.
    pub fn anchored_at(mut self, anchor: NaiveDate) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days.max(1);
        self
    }

    fn base_time(&self, needs: &Needs) -> NaiveDateTime {
        needs
            .departure_window
            .start
            .map(|start| start.date().and_time(NaiveTime::MIN))
            .unwrap_or_else(|| self.anchor.and_time(NaiveTime::MIN))
    }

    fn generate(&self, needs: &Needs, mode: TransportMode, rng: &mut StdRng) -> Vec<Ticket> {
        let Some(profile) = profile(mode) else {
            return Vec::new();
        };
        let base = self.base_time(needs);
        let slots = departure_slots(&needs.departure_window);
        let mut tickets = Vec::new();

        for day in 0..self.days {
            for &(hour, minute) in &slots {
                let departure = base
                    + Duration::days(i64::from(day))
                    + Duration::hours(i64::from(hour))
                    + Duration::minutes(i64::from(minute));
                let duration = rng.gen_range(profile.duration_minutes.0..profile.duration_minutes.1);
                let arrival = departure + Duration::minutes(i64::from(duration));

                for &seat_class in profile.seats {
                    let fare = profile.base_fare * price_multiplier(seat_class)
                        + f64::from(rng.gen_range(-50..100));
                    let price = fare.clamp(profile.fare_bounds.0, profile.fare_bounds.1);

                    let mut available_seats = rng.gen_range(0..100);
                    if available_seats < 5 {
                        available_seats = rng.gen_range(0..5);
                    }

                    let operator = profile
                        .operators
                        .choose(rng)
                        .copied()
                        .unwrap_or("Unknown");
                    let vehicle_number = format!(
                        "{}{}",
                        operator_code(operator),
                        rng.gen_range(1000..9999)
                    );

                    let (departure_station, arrival_station, extras, transfers) = match mode {
                        TransportMode::Flight => (
                            format!("{} Airport", needs.departure_city),
                            format!("{} Airport", needs.arrival_city),
                            TicketExtras::Flight {
                                meal_included: matches!(
                                    seat_class,
                                    SeatClass::Business | SeatClass::First
                                ),
                                aircraft_type: AIRCRAFT.choose(rng).map(|name| name.to_string()),
                                baggage_allowance: Some("20kg checked, 10kg carry-on".to_string()),
                            },
                            None,
                        ),
                        _ => {
                            let stop_count = rng.gen_range(0..3);
                            let stops = (1..=stop_count)
                                .map(|index| intermediate_stop(index, departure, duration))
                                .collect();
                            let transfers = rng
                                .gen_bool(0.2)
                                .then(|| vec![intermediate_stop(1, departure, duration)]);
                            (
                                format!("{} Station", needs.departure_city),
                                format!("{} Station", needs.arrival_city),
                                TicketExtras::Train {
                                    is_high_speed: seat_class.is_high_speed(),
                                    stops,
                                },
                                transfers,
                            )
                        }
                    };

                    tickets.push(Ticket {
                        id: format!(
                            "{}-{}-{}",
                            mode.label(),
                            vehicle_number,
                            departure.format("%Y%m%d%H%M")
                        ),
                        mode,
                        departure_city: needs.departure_city.clone(),
                        departure_station,
                        departure_time: departure,
                        arrival_city: needs.arrival_city.clone(),
                        arrival_station,
                        arrival_time: arrival,
                        price,
                        seat_class,
                        available_seats,
                        operator: operator.to_string(),
                        vehicle_number,
                        duration_minutes: duration,
                        transfers,
                        extras: Some(extras),
                    });
                }
            }
        }

        tickets
    }
}

impl Default for MockCandidateSupplier {
    fn default() -> Self {
        Self::new(7)
    }
}

#[async_trait]
impl CandidateSupplier for MockCandidateSupplier {
    async fn supply(&self, needs: &Needs) -> Result<Vec<Ticket>, SourcingError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(call));

        let direct_only = needs.max_transfers == Some(0);
        let tickets: Vec<Ticket> = needs
            .preferred_modes
            .iter()
            .flat_map(|mode| self.generate(needs, *mode, &mut rng))
            .filter(|ticket| !direct_only || ticket.is_direct())
            .collect();

        debug!(
            from = %needs.departure_city,
            to = %needs.arrival_city,
            candidates = tickets.len(),
            "generated mock candidates"
        );
        Ok(tickets)
    }
}

fn operator_code(operator: &str) -> String {
    operator
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect::<String>()
        .to_uppercase()
}

fn intermediate_stop(index: u32, departure: NaiveDateTime, duration: u32) -> TransferStop {
    let offset = i64::from(duration * index / 3);
    TransferStop {
        station: format!("Junction {index}"),
        arrival: departure + Duration::minutes(offset),
        departure: departure + Duration::minutes(offset + 5),
    }
}
