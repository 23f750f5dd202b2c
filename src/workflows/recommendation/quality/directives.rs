use std::collections::BTreeSet;

use super::super::domain::{
    DirectiveKind, ImprovementDirective, Needs, QualityScore, Recommendation, TransportMode,
};
use super::rules::{available_count, direct_count};

/// Turns low sub-scores into actionable directives. Never empty.
pub(crate) fn improvement_directives(
    recommendation: &Recommendation,
    needs: &Needs,
    scores: &QualityScore,
) -> Vec<ImprovementDirective> {
    let options = &recommendation.options;
    let mut directives = Vec::new();

    if scores.needs_match < 60.0 {
        directives.push(ImprovementDirective::new(
            DirectiveKind::CoreNeeds,
            "Focus on the traveler's core needs, especially transport mode and budget",
        ));
    }

    if scores.needs_match < 80.0 {
        if let Some(max) = needs.budget.ceiling() {
            if options.iter().any(|option| option.ticket.price > max) {
                directives.push(ImprovementDirective::new(
                    DirectiveKind::Budget,
                    format!("Offer more options within the budget ceiling of {max:.0}"),
                ));
            }
        }

        if let Some(preference) = needs.departure_window.preferred_time {
            directives.push(ImprovementDirective::new(
                DirectiveKind::DepartureTime,
                format!(
                    "Match the {} departure preference more closely",
                    preference.label()
                ),
            ));
        }
    }

    if scores.completeness < 70.0 {
        if options.len() < 3 {
            directives.push(ImprovementDirective::new(
                DirectiveKind::Diversity,
                "Offer more varied options, at least three distinct choices",
            ));
        }

        let modes: BTreeSet<TransportMode> =
            options.iter().map(|option| option.ticket.mode).collect();
        if modes.len() < needs.preferred_modes.len() {
            directives.push(ImprovementDirective::new(
                DirectiveKind::ModeCoverage,
                "Cover every preferred transport mode",
            ));
        }
    }

    if scores.practicality < 80.0 {
        if (available_count(options) as f64) < options.len() as f64 / 2.0 {
            directives.push(ImprovementDirective::new(
                DirectiveKind::Availability,
                "Offer more options that can be booked immediately",
            ));
        }

        if direct_count(options) == 0 && !options.is_empty() {
            directives.push(ImprovementDirective::new(
                DirectiveKind::DirectRoutes,
                "Include direct services to cut down on transfers",
            ));
        }
    }

    if scores.needs_match >= 80.0
        && scores.completeness >= 80.0
        && scores.practicality >= 80.0
        && scores.overall < 90.0
    {
        directives.push(ImprovementDirective::new(
            DirectiveKind::Polish,
            "Quality is good overall; highlight distinctive advantages to lift it further",
        ));
    }

    if directives.is_empty() {
        directives.push(default_directive(scores.overall));
    }

    directives
}

pub(crate) fn default_directive(overall: f64) -> ImprovementDirective {
    if overall >= 90.0 {
        ImprovementDirective::new(
            DirectiveKind::Polish,
            "Recommendation is already strong; add personalised details",
        )
    } else {
        ImprovementDirective::new(
            DirectiveKind::General,
            "Raise overall quality so the options better satisfy the traveler's needs",
        )
    }
}

pub(crate) fn no_options_directive() -> ImprovementDirective {
    ImprovementDirective::new(DirectiveKind::NoOptions, "No matching options were found")
}
