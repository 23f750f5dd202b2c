use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Transportation mode of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Flight,
    Train,
    Bus,
    Ship,
}

impl TransportMode {
    pub fn label(self) -> &'static str {
        match self {
            TransportMode::Flight => "flight",
            TransportMode::Train => "train",
            TransportMode::Bus => "bus",
            TransportMode::Ship => "ship",
        }
    }
}

/// Seat or cabin tier across air and rail offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
    HardSeat,
    SoftSeat,
    HardSleeper,
    SoftSleeper,
    Standing,
    HighSpeedSecond,
    HighSpeedFirst,
    HighSpeedBusiness,
}

impl SeatClass {
    pub fn label(self) -> &'static str {
        match self {
            SeatClass::Economy => "economy",
            SeatClass::PremiumEconomy => "premium_economy",
            SeatClass::Business => "business",
            SeatClass::First => "first",
            SeatClass::HardSeat => "hard_seat",
            SeatClass::SoftSeat => "soft_seat",
            SeatClass::HardSleeper => "hard_sleeper",
            SeatClass::SoftSleeper => "soft_sleeper",
            SeatClass::Standing => "standing",
            SeatClass::HighSpeedSecond => "high_speed_second",
            SeatClass::HighSpeedFirst => "high_speed_first",
            SeatClass::HighSpeedBusiness => "high_speed_business",
        }
    }

    pub fn is_high_speed(self) -> bool {
        matches!(
            self,
            SeatClass::HighSpeedSecond | SeatClass::HighSpeedFirst | SeatClass::HighSpeedBusiness
        )
    }
}

/// Intermediate stop or connection on a journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferStop {
    pub station: String,
    pub arrival: NaiveDateTime,
    pub departure: NaiveDateTime,
}

/// Mode specific details that do not influence scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TicketExtras {
    Flight {
        meal_included: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        aircraft_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        baggage_allowance: Option<String>,
    },
    Train {
        is_high_speed: bool,
        #[serde(default)]
        stops: Vec<TransferStop>,
    },
}

/// A single transportation offer. Tickets are supplied per iteration and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub mode: TransportMode,
    pub departure_city: String,
    pub departure_station: String,
    pub departure_time: NaiveDateTime,
    pub arrival_city: String,
    pub arrival_station: String,
    pub arrival_time: NaiveDateTime,
    pub price: f64,
    pub seat_class: SeatClass,
    pub available_seats: u32,
    pub operator: String,
    pub vehicle_number: String,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfers: Option<Vec<TransferStop>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<TicketExtras>,
}

impl Ticket {
    pub fn is_direct(&self) -> bool {
        self.transfers
            .as_ref()
            .map(|stops| stops.is_empty())
            .unwrap_or(true)
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.as_ref().map(Vec::len).unwrap_or(0)
    }

    /// Human readable duration such as `2h 5m`.
    pub fn duration_text(&self) -> String {
        let hours = self.duration_minutes / 60;
        let minutes = self.duration_minutes % 60;
        format!("{hours}h {minutes}m")
    }
}
