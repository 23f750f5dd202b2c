mod needs;
mod recommendation;
mod ticket;

pub use needs::{
    Budget, Needs, PartialNeeds, PriceLevel, TimePreference, TimeWindow, TravelPriority,
    UNSPECIFIED_CITY,
};
pub(crate) use recommendation::clamp_score;
pub use recommendation::{
    DirectiveKind, ImprovementDirective, QualityScore, Recommendation, RecommendationId,
    RecommendationOption, RecommendationStatus, ReflectionFeedback, ScoreFactor, ScoreReason,
    COMPLETENESS_WEIGHT, NEEDS_MATCH_WEIGHT, PRACTICALITY_WEIGHT,
};
pub use ticket::{SeatClass, Ticket, TicketExtras, TransferStop, TransportMode};
