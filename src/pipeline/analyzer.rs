//! Prompt classification: response type, complexity and an enhanced prompt.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::api::ChatMessage;
use crate::errors::{AnalysisFormatError, GatewayError};
use crate::gateway::{Capability, ModelGateway};
use crate::prompts;
use crate::types::{Complexity, ResponseType};

use super::types::{
    ConfidenceSource, FALLBACK_ANALYSIS_CONFIDENCE, ModelUsageRecord, PURPOSE_ANALYSIS,
    PromptAnalysis,
};

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis: PromptAnalysis,
    pub usage: ModelUsageRecord,
    /// False when the payload could not be decoded and the fallback was used.
    pub parsed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(alias = "response_type", alias = "type")]
    response_type: String,
    #[serde(default)]
    complexity: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default, alias = "enhanced_prompt")]
    enhanced_prompt: Option<String>,
    #[serde(default, alias = "suggested_models")]
    suggested_models: Vec<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Classifies `prompt` with one gateway call.
///
/// Only a failed gateway call is an error. A payload that cannot be decoded
/// produces [`PromptAnalysis::fallback`] and an assumed confidence sample.
pub async fn analyze(
    gateway: &dyn ModelGateway,
    prompt: &str,
) -> Result<AnalysisOutcome, GatewayError> {
    let messages = [
        ChatMessage::system(prompts::ANALYSIS_SYSTEM),
        ChatMessage::user(prompt),
    ];
    let completion = gateway.chat_complete(&messages, None).await?;

    let (analysis, parsed) = match parse_analysis(&completion.content, prompt) {
        Ok(analysis) => (analysis, true),
        Err(e) => {
            log::warn!("prompt analysis unparseable, using fallback: {e}");
            (PromptAnalysis::fallback(prompt), false)
        }
    };

    let confidence = if parsed {
        ConfidenceSource::Measured(analysis.confidence)
    } else {
        ConfidenceSource::Assumed(FALLBACK_ANALYSIS_CONFIDENCE)
    };

    Ok(AnalysisOutcome {
        usage: ModelUsageRecord {
            model_name: gateway.model_name(Capability::Chat),
            purpose: PURPOSE_ANALYSIS.to_string(),
            tokens_consumed: completion.tokens_consumed,
            confidence,
        },
        analysis,
        parsed,
    })
}

/// Decodes the analyzer payload. Tolerates code fences and surrounding prose.
pub fn parse_analysis(payload: &str, prompt: &str) -> Result<PromptAnalysis, AnalysisFormatError> {
    let raw = decode_raw(payload)?;

    let response_type = ResponseType::parse(&raw.response_type)
        .ok_or_else(|| AnalysisFormatError::UnknownResponseType(raw.response_type.clone()))?;

    let enhanced_prompt = raw
        .enhanced_prompt
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| prompt.to_string());

    let confidence = raw
        .confidence
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(FALLBACK_ANALYSIS_CONFIDENCE);

    Ok(PromptAnalysis {
        response_type,
        complexity: raw
            .complexity
            .as_deref()
            .map(Complexity::parse_or_moderate)
            .unwrap_or(Complexity::Moderate),
        reasoning: raw.reasoning.unwrap_or_default(),
        enhanced_prompt,
        suggested_models: raw.suggested_models,
        confidence,
    })
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("fence regex is valid")
    })
}

/// Tries each candidate object in order and keeps the first that decodes.
fn decode_raw(payload: &str) -> Result<RawAnalysis, AnalysisFormatError> {
    let mut first_err = None;
    for candidate in json_object_candidates(payload) {
        match serde_json::from_str::<RawAnalysis>(candidate) {
            Ok(raw) => return Ok(raw),
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    Err(first_err.map_or(AnalysisFormatError::NoJsonObject, AnalysisFormatError::Json))
}

/// Balanced `{...}` objects in `text`: a fenced block first, then one per opening brace.
pub(crate) fn json_object_candidates(text: &str) -> Vec<&str> {
    let fenced = fence_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());
    let scanned = text
        .match_indices('{')
        .filter_map(|(start, _)| balanced_object_at(text, start));
    fenced.into_iter().chain(scanned).collect()
}

fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
