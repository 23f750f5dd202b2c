use serde::Deserialize;

use super::super::capabilities::JudgmentError;
use super::super::domain::{DirectiveKind, ImprovementDirective, QualityScore};
use super::directives::default_directive;

pub(crate) const FALLBACK_SCORE: f64 = 30.0;

/// Structured judgment returned by an external quality judge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JudgeVerdict {
    #[serde(alias = "needs_match_score")]
    pub needs_match: f64,
    #[serde(alias = "completeness_score")]
    pub completeness: f64,
    #[serde(alias = "practicality_score")]
    pub practicality: f64,
    #[serde(default, alias = "overall_score")]
    pub overall: Option<f64>,
    #[serde(default)]
    pub is_sufficient: Option<bool>,
    #[serde(default, alias = "improvement_suggestions")]
    pub suggestions: Vec<String>,
}

impl JudgeVerdict {
    /// Parses the first JSON object embedded in free-form judge output.
    pub fn parse(raw: &str) -> Result<Self, JudgmentError> {
        let json = extract_json_object(raw)
            .ok_or_else(|| JudgmentError::Malformed("no JSON object in judgment".to_string()))?;
        let verdict: JudgeVerdict = serde_json::from_str(json)
            .map_err(|err| JudgmentError::Malformed(err.to_string()))?;
        verdict.validate()
    }

    fn validate(self) -> Result<Self, JudgmentError> {
        let dimensions = [self.needs_match, self.completeness, self.practicality];
        if dimensions.iter().any(|value| !value.is_finite())
            || self.overall.map(|value| !value.is_finite()).unwrap_or(false)
        {
            return Err(JudgmentError::Malformed(
                "judgment contains non-finite scores".to_string(),
            ));
        }
        Ok(self)
    }

    pub(crate) fn scores(&self) -> QualityScore {
        match self.overall {
            Some(overall) => QualityScore::with_overall(
                self.needs_match,
                self.completeness,
                self.practicality,
                overall,
            ),
            None => {
                QualityScore::from_dimensions(self.needs_match, self.completeness, self.practicality)
            }
        }
    }

    pub(crate) fn directives(&self, scores: &QualityScore) -> Vec<ImprovementDirective> {
        let mut directives: Vec<ImprovementDirective> = self
            .suggestions
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .map(|text| ImprovementDirective::new(DirectiveKind::External, text))
            .collect();
        if directives.is_empty() && scores.overall < 90.0 {
            directives.push(default_directive(scores.overall));
        }
        directives
    }
}

/// Fixed low-confidence judgment used when the judge output cannot be parsed.
pub(crate) fn fallback_scores() -> QualityScore {
    QualityScore::with_overall(FALLBACK_SCORE, FALLBACK_SCORE, FALLBACK_SCORE, FALLBACK_SCORE)
}

pub(crate) fn fallback_directive() -> ImprovementDirective {
    ImprovementDirective::new(
        DirectiveKind::JudgeFallback,
        "Quality judgment could not be parsed; treat this recommendation as unverified",
    )
}

/// Slice from the first `{` to the last `}`, when both exist in that order.
pub(crate) fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
