use crate::infra::{build_service, InMemoryRecommendationStore};
use clap::Args;
use std::sync::Arc;
use ticket_reflect::config::AppConfig;
use ticket_reflect::error::AppError;
use ticket_reflect::workflows::recommendation::{
    Recommendation, RecommendationRequest, RecommendationResponse, ReflectRequest,
    StoredRecommendation,
};

const SAMPLE_CONVERSATIONS: [&str; 3] = [
    "I need a train from Beijing to Shanghai on the morning of the trip, budget under 600",
    "Looking for a direct flight from Guangzhou to Chengdu in the evening, comfort matters most",
    "Cheapest way from Hangzhou to Xiamen, any time works and I am flexible",
];

const SAMPLE_FEEDBACK: &str = "A fast connection matters more to me than a window seat";

#[derive(Args, Debug)]
pub(crate) struct RecommendArgs {
    /// Free-text travel request, e.g. "train from Beijing to Shanghai tomorrow morning"
    pub(crate) text: String,
    /// Override the configured refinement iteration budget
    #[arg(long)]
    pub(crate) max_iterations: Option<u32>,
    /// Override the configured quality threshold (0-100)
    #[arg(long)]
    pub(crate) score_threshold: Option<f64>,
    /// Print the full response envelope as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Refinement iteration budget for every sample conversation
    #[arg(long, default_value_t = 2)]
    pub(crate) max_iterations: u32,
    /// Quality threshold for every sample conversation
    #[arg(long, default_value_t = 90.0)]
    pub(crate) score_threshold: f64,
}

pub(crate) async fn run_recommend(args: RecommendArgs) -> Result<(), AppError> {
    let RecommendArgs {
        text,
        max_iterations,
        score_threshold,
        json,
    } = args;

    let config = AppConfig::load()?;
    let service = build_service(&config, Arc::new(InMemoryRecommendationStore::default()));

    let request = RecommendationRequest {
        max_iterations,
        score_threshold,
        ..RecommendationRequest::new(text)
    };
    let record = service.recommend(request).await?;

    if json {
        match serde_json::to_string_pretty(&RecommendationResponse::from(record)) {
            Ok(payload) => println!("{payload}"),
            Err(err) => println!("Response payload unavailable: {err}"),
        }
    } else {
        render_recommendation(&record);
    }

    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        max_iterations,
        score_threshold,
    } = args;

    let config = AppConfig::load()?;
    let service = build_service(&config, Arc::new(InMemoryRecommendationStore::default()));

    println!("Reflective ticket recommendation demo");
    println!(
        "- iteration budget {} | quality threshold {:.1} | {} advisor",
        max_iterations,
        score_threshold,
        if config.llm.is_some() {
            "model-backed"
        } else {
            "offline"
        }
    );

    let mut first = None;
    for text in SAMPLE_CONVERSATIONS {
        println!("\nTraveler: \"{text}\"");
        let request = RecommendationRequest {
            max_iterations: Some(max_iterations),
            score_threshold: Some(score_threshold),
            ..RecommendationRequest::new(text)
        };
        let record = service.recommend(request).await?;
        render_recommendation(&record);
        first.get_or_insert_with(|| record.id().clone());
    }

    let Some(id) = first else {
        return Ok(());
    };

    println!("\nTraveler follow-up: \"{SAMPLE_FEEDBACK}\"");
    let request = ReflectRequest {
        feedback: Some(SAMPLE_FEEDBACK.to_string()),
    };
    match service.reflect(&id, request).await {
        Ok(record) => render_recommendation(&record),
        Err(err) => println!("  Follow-up reflection unavailable: {err}"),
    }

    Ok(())
}

fn render_recommendation(record: &StoredRecommendation) {
    let recommendation = &record.recommendation;
    let summary = record.summary();
    println!(
        "- Recommendation {} -> {} | overall {:.1} | {} options | {} reflections",
        summary.recommendation_id,
        summary.status,
        summary.overall_score,
        summary.option_count,
        summary.reflection_iterations
    );
    println!(
        "  Quality: needs match {:.1} | completeness {:.1} | practicality {:.1}",
        recommendation.scores.needs_match,
        recommendation.scores.completeness,
        recommendation.scores.practicality
    );
    if let Some(reason) = recommendation.metadata.get("stop_reason") {
        println!("  Stopped: {reason}");
    }
    if let Some(error) = recommendation.metadata.get("error") {
        println!("  Error: {error}");
    }

    render_options(recommendation);
    render_history(recommendation);
}

fn render_options(recommendation: &Recommendation) {
    if recommendation.options.is_empty() {
        return;
    }
    println!("  Top options:");
    for option in recommendation.options.iter().take(3) {
        let ticket = &option.ticket;
        println!(
            "    {}. {} {} {} -> {} | {} | {:.0} | {} | {} seats left | score {:.1}",
            option.rank,
            ticket.mode.label(),
            ticket.vehicle_number,
            ticket.departure_time.format("%Y-%m-%d %H:%M"),
            ticket.arrival_time.format("%H:%M"),
            ticket.duration_text(),
            ticket.price,
            ticket.seat_class.label(),
            ticket.available_seats,
            option.score
        );
    }
}

fn render_history(recommendation: &Recommendation) {
    for feedback in &recommendation.reflection_history {
        let adjusted: Vec<&str> = feedback
            .adjusted_parameters
            .keys()
            .map(String::as_str)
            .collect();
        println!(
            "  Reflection {}: overall {:.1} over {} options | weaknesses: {} | adjusted: {}",
            feedback.iteration,
            feedback.scores.overall,
            feedback.option_count,
            join_or_none(feedback.weaknesses.iter().map(String::as_str)),
            join_or_none(adjusted.into_iter())
        );
    }
}

fn join_or_none<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined
    }
}
