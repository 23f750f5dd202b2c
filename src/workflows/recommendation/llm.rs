//! Language-model backed capabilities over an OpenAI compatible chat endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::adjust::{apply_adjustments, AdjustmentMap};
use super::capabilities::{
    ExtractionError, JudgmentError, NeedsExtractor, QualityJudge, ReflectError, Reflector,
};
use super::domain::{ImprovementDirective, Needs, QualityScore, Recommendation};
use super::extractor::KeywordNeedsExtractor;
use super::quality::{extract_json_object, JudgeVerdict};
use crate::config::LlmConfig;

const EXTRACTION_SYSTEM: &str = "You extract structured travel needs from conversations. \
Reply with a single JSON object and nothing else.";

const REFLECTION_SYSTEM: &str = "You are a demanding traveler reviewing a ticket \
recommendation. Reply with a single JSON object of adjustments keyed by dotted field path.";

const JUDGE_SYSTEM: &str = "You are a strict reviewer of ticket recommendations. \
Reply with a single JSON object containing scores between 0 and 100.";

/// Sections whose nested objects are flattened into dotted adjustment paths.
const NESTED_SECTIONS: [&str; 5] = [
    "budget",
    "departure_window",
    "departure_time_range",
    "return_window",
    "return_time_range",
];

/// Minimal chat completion seam.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion response carried no content")]
    EmptyResponse,
}

/// Chat completions client for OpenAI compatible servers.
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f64,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            temperature: 0.2,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.model.clone(),
        )
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
            "temperature": self.temperature,
        });

        let mut request = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let payload: Value = response.json().await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or(CompletionError::EmptyResponse)
    }
}

/// Extraction, reflection and judgment delegated to a language model.
///
/// Extraction degrades to keyword parsing when the model is unreachable or replies with
/// something unusable.
pub struct LlmAdvisor {
    client: Arc<dyn CompletionClient>,
    keywords: KeywordNeedsExtractor,
}

impl LlmAdvisor {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            keywords: KeywordNeedsExtractor::new(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(Arc::new(OpenAiCompatibleClient::from_config(config)))
    }
}

#[async_trait]
impl NeedsExtractor for LlmAdvisor {
    async fn extract(&self, text: &str) -> Result<Needs, ExtractionError> {
        let prompt = extraction_prompt(text);
        let raw = match self.client.complete(EXTRACTION_SYSTEM, &prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "model extraction unavailable, parsing keywords");
                return self.keywords.parse(text);
            }
        };

        match needs_from_reply(&raw) {
            Some(needs) => Ok(needs),
            None => {
                warn!("model extraction reply unusable, parsing keywords");
                self.keywords.parse(text)
            }
        }
    }
}

#[async_trait]
impl Reflector for LlmAdvisor {
    async fn reflect(
        &self,
        needs: &Needs,
        scores: &QualityScore,
        directives: &[ImprovementDirective],
    ) -> Result<AdjustmentMap, ReflectError> {
        let prompt = reflection_prompt(needs, scores, directives);
        let raw = self
            .client
            .complete(REFLECTION_SYSTEM, &prompt)
            .await
            .map_err(|err| ReflectError::Unavailable(err.to_string()))?;
        adjustments_from_reply(&raw)
    }
}

#[async_trait]
impl QualityJudge for LlmAdvisor {
    async fn judge(
        &self,
        recommendation: &Recommendation,
        needs: &Needs,
    ) -> Result<JudgeVerdict, JudgmentError> {
        let prompt = judge_prompt(recommendation, needs);
        let raw = self
            .client
            .complete(JUDGE_SYSTEM, &prompt)
            .await
            .map_err(|err| JudgmentError::Unavailable(err.to_string()))?;
        JudgeVerdict::parse(&raw)
    }
}

fn extraction_prompt(text: &str) -> String {
    format!(
        "Extract the traveler's needs as JSON with these fields:\n\
         - departure_city, arrival_city\n\
         - departure_window {{start, end, flexible_hours, preferred_time}} (morning, afternoon, evening, night, any)\n\
         - return_window, when a return trip is mentioned\n\
         - preferred_modes (flight, train, bus, ship)\n\
         - preferred_seat_classes\n\
         - budget {{min_price, max_price, target_price}}\n\
         - priorities (price, time, comfort, convenience, reliability)\n\
         - max_transfers, max_duration_minutes\n\n\
         Conversation:\n{text}\n\nJSON:"
    )
}

fn reflection_prompt(
    needs: &Needs,
    scores: &QualityScore,
    directives: &[ImprovementDirective],
) -> String {
    let needs_json = serde_json::to_string_pretty(needs).unwrap_or_default();
    let directive_lines = directives
        .iter()
        .map(|directive| format!("- {directive}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Traveler needs:\n{needs_json}\n\n\
         Scores: needs match {:.1}, completeness {:.1}, practicality {:.1}, overall {:.1}\n\n\
         Improvement directives:\n{directive_lines}\n\n\
         Propose changes to the needs that would produce better options, as a JSON object such as \
         {{\"budget.max_price\": 1200, \"departure_window.flexible_hours\": 4}}.",
        scores.needs_match, scores.completeness, scores.practicality, scores.overall
    )
}

fn judge_prompt(recommendation: &Recommendation, needs: &Needs) -> String {
    let needs_json = serde_json::to_string_pretty(needs).unwrap_or_default();
    let options = recommendation
        .options
        .iter()
        .take(5)
        .map(|option| {
            let ticket = &option.ticket;
            format!(
                "{}. {} {} {} -> {}, {}, price {:.0}, {} seats left, {} transfers",
                option.rank,
                ticket.mode.label(),
                ticket.vehicle_number,
                ticket.departure_time.format("%Y-%m-%d %H:%M"),
                ticket.arrival_time.format("%H:%M"),
                ticket.seat_class.label(),
                ticket.price,
                ticket.available_seats,
                ticket.transfer_count()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Traveler needs:\n{needs_json}\n\nRecommended options:\n{options}\n\n\
         Judge whether the recommendation understands the core needs, misses important factors, \
         overlooks better alternatives or reasons poorly. Reply with JSON: \
         {{\"needs_match_score\": 0-100, \"completeness_score\": 0-100, \"practicality_score\": 0-100, \
         \"overall_score\": 0-100, \"is_sufficient\": true|false, \"improvement_suggestions\": [\"...\"]}}"
    )
}

/// Builds needs from a model reply by routing every field through the adjustment registry.
fn needs_from_reply(raw: &str) -> Option<Needs> {
    let object = parse_object(raw)?;
    let departure = object.get("departure_city")?.as_str()?.trim();
    let arrival = object.get("arrival_city")?.as_str()?.trim();
    if departure.is_empty() || arrival.is_empty() {
        return None;
    }

    let report = apply_adjustments(&Needs::new(departure, arrival), &flatten(object));
    if !report.ignored.is_empty() {
        debug!(ignored = ?report.ignored, "model extraction fields ignored");
    }
    Some(report.needs)
}

fn adjustments_from_reply(raw: &str) -> Result<AdjustmentMap, ReflectError> {
    let object = parse_object(raw)
        .ok_or_else(|| ReflectError::Malformed("reply is not a JSON object".to_string()))?;
    let object = match object.get("adjustments") {
        Some(Value::Object(inner)) => inner.clone(),
        _ => object,
    };
    Ok(flatten(object))
}

fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    let json = extract_json_object(raw)?;
    match serde_json::from_str::<Value>(json).ok()? {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

fn flatten(object: Map<String, Value>) -> AdjustmentMap {
    let mut adjustments = AdjustmentMap::new();
    for (key, value) in object {
        match value {
            Value::Object(inner) if NESTED_SECTIONS.contains(&key.as_str()) => {
                if key.starts_with("return") {
                    adjustments.insert(key.clone(), json!({}));
                }
                for (field, nested) in inner {
                    adjustments.insert(format!("{key}.{field}"), nested);
                }
            }
            Value::Null => {}
            other => {
                adjustments.insert(key, other);
            }
        }
    }
    adjustments
}
