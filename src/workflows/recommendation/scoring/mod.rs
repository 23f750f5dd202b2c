//! Weighted multi-factor ticket scoring.

mod rules;

use tracing::debug;
use uuid::Uuid;

use super::domain::{Needs, RecommendationOption, ScoreReason, Ticket};

/// A ticket with its total score and factor breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTicket {
    pub ticket: Ticket,
    pub total: f64,
    pub reasons: Vec<ScoreReason>,
}

impl ScoredTicket {
    pub fn into_option(self, rank: usize) -> RecommendationOption {
        RecommendationOption {
            option_id: Uuid::new_v4().to_string(),
            ticket: self.ticket,
            score: self.total,
            rank,
            reasons: self.reasons,
        }
    }
}

/// Stateless engine applying the fixed factor weights. Safe to share across requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, ticket: &Ticket, needs: &Needs) -> ScoredTicket {
        let reasons = rules::score_factors(ticket, needs);
        let total = reasons
            .iter()
            .map(|reason| reason.weight * reason.score)
            .sum::<f64>()
            .clamp(0.0, 100.0);

        ScoredTicket {
            ticket: ticket.clone(),
            total,
            reasons,
        }
    }

    /// Scores every candidate and orders them by descending total. Ties keep input order.
    pub fn rank(&self, tickets: &[Ticket], needs: &Needs) -> Vec<ScoredTicket> {
        let mut scored: Vec<ScoredTicket> = tickets
            .iter()
            .map(|ticket| self.score(ticket, needs))
            .collect();
        scored.sort_by(|left, right| right.total.total_cmp(&left.total));

        debug!(candidates = scored.len(), "ranked candidate tickets");
        scored
    }
}

#[cfg(test)]
pub(crate) use rules::{availability_score, departure_score, duration_score, price_score};
