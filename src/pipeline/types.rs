use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gateway::GeneratedImage;
use crate::types::{Complexity, ResponseType};

/// Confidence assigned to an analysis that could not be parsed.
pub const FALLBACK_ANALYSIS_CONFIDENCE: f64 = 0.7;
pub const ALTERNATIVE_CONFIDENCE: f64 = 0.85;
pub const SYNTHESIS_CONFIDENCE: f64 = 0.9;

pub const PURPOSE_ANALYSIS: &str = "Prompt Analysis";
pub const PURPOSE_ALTERNATIVE: &str = "Alternative Generation";
pub const PURPOSE_SYNTHESIS: &str = "Response Synthesis";

/// Pipeline stages in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Analyzing,
    GeneratingPrimary,
    GeneratingAlternative,
    Synthesizing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analyzing => "ANALYZING",
            Stage::GeneratingPrimary => "GENERATING_PRIMARY",
            Stage::GeneratingAlternative => "GENERATING_ALTERNATIVE",
            Stage::Synthesizing => "SYNTHESIZING",
        }
    }

    pub fn description(&self, response_type: Option<ResponseType>) -> String {
        match (self, response_type) {
            (Stage::Analyzing, _) => "Analyzing prompt and selecting a response strategy".to_string(),
            (Stage::GeneratingPrimary, Some(kind)) => format!("Generating primary {kind} response"),
            (Stage::GeneratingPrimary, None) => "Generating primary response".to_string(),
            (Stage::GeneratingAlternative, Some(ResponseType::Code)) => {
                "Reviewing code and generating an alternative implementation".to_string()
            }
            (Stage::GeneratingAlternative, _) => "Generating alternative perspective".to_string(),
            (Stage::Synthesizing, _) => "Synthesizing final response".to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Processing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStep {
    /// 1-based, contiguous, in execution order.
    pub ordinal: u32,
    pub stage: Stage,
    pub description: String,
    pub model_name: String,
    pub duration_ms: u64,
    pub status: StepStatus,
}

/// Where a confidence sample came from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "lowercase")]
pub enum ConfidenceSource {
    /// Reported by the model itself.
    Measured(f64),
    /// Fixed placeholder for stages whose backend reports nothing.
    Assumed(f64),
}

impl ConfidenceSource {
    /// Sample value clamped into `[0, 1]`; NaN reads as 0.
    pub fn value(&self) -> f64 {
        let raw = match self {
            ConfidenceSource::Measured(v) | ConfidenceSource::Assumed(v) => *v,
        };
        if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, ConfidenceSource::Measured(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsageRecord {
    pub model_name: String,
    pub purpose: String,
    pub tokens_consumed: u32,
    pub confidence: ConfidenceSource,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptAnalysis {
    pub response_type: ResponseType,
    pub complexity: Complexity,
    pub reasoning: String,
    /// Never empty.
    pub enhanced_prompt: String,
    pub suggested_models: Vec<String>,
    pub confidence: f64,
}

impl PromptAnalysis {
    /// Used when the analysis payload cannot be decoded.
    pub fn fallback(prompt: &str) -> Self {
        Self {
            response_type: ResponseType::Text,
            complexity: Complexity::Moderate,
            reasoning: "Analysis unavailable; answering as a general text request.".to_string(),
            enhanced_prompt: prompt.to_string(),
            suggested_models: Vec::new(),
            confidence: FALLBACK_ANALYSIS_CONFIDENCE,
        }
    }
}

/// Output of one generation call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub content: String,
    pub tokens_consumed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<GeneratedImage>,
}

impl GenerationResult {
    pub fn new(content: impl Into<String>, tokens_consumed: u32) -> Self {
        Self {
            content: content.into(),
            tokens_consumed,
            image: None,
        }
    }

    pub fn from_image(image: GeneratedImage) -> Self {
        Self {
            content: image.url.clone(),
            tokens_consumed: 0,
            image: Some(image),
        }
    }
}

/// Final artifact of a successful Super Mode run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub run_id: String,
    pub response_type: ResponseType,
    pub content: String,
    pub reasoning: String,
    pub steps: Vec<ProcessingStep>,
    pub usage: Vec<ModelUsageRecord>,
    pub overall_confidence: f64,
    /// Tokens spent on primary generation; not part of `usage`.
    pub primary_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Vec<String>>,
    /// Short description shown with image results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<GeneratedImage>,
}

impl PipelineResult {
    pub fn total_tokens(&self) -> u32 {
        self.usage
            .iter()
            .fold(self.primary_tokens, |acc, u| acc.saturating_add(u.tokens_consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_tags_are_upper_snake() {
        assert_eq!(Stage::GeneratingAlternative.to_string(), "GENERATING_ALTERNATIVE");
        let json = serde_json::to_value(Stage::GeneratingPrimary).unwrap();
        assert_eq!(json, "GENERATING_PRIMARY");
    }

    #[test]
    fn confidence_value_is_clamped() {
        assert_eq!(ConfidenceSource::Measured(1.4).value(), 1.0);
        assert_eq!(ConfidenceSource::Measured(-0.2).value(), 0.0);
        assert_eq!(ConfidenceSource::Assumed(f64::NAN).value(), 0.0);
        assert!(!ConfidenceSource::Assumed(0.85).is_measured());
    }

    #[test]
    fn confidence_serializes_with_source_tag() {
        let json = serde_json::to_value(ConfidenceSource::Assumed(0.9)).unwrap();
        assert_eq!(json["source"], "assumed");
        assert_eq!(json["value"], 0.9);
    }

    #[test]
    fn fallback_analysis_is_text_moderate() {
        let analysis = PromptAnalysis::fallback("hello");
        assert_eq!(analysis.response_type, ResponseType::Text);
        assert_eq!(analysis.complexity, Complexity::Moderate);
        assert_eq!(analysis.enhanced_prompt, "hello");
        assert_eq!(analysis.confidence, FALLBACK_ANALYSIS_CONFIDENCE);
    }

    #[test]
    fn step_serializes_camel_case() {
        let step = ProcessingStep {
            ordinal: 1,
            stage: Stage::Analyzing,
            description: "d".to_string(),
            model_name: "m".to_string(),
            duration_ms: 12,
            status: StepStatus::Completed,
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["modelName"], "m");
        assert_eq!(json["durationMs"], 12);
        assert_eq!(json["status"], "completed");
    }
}
