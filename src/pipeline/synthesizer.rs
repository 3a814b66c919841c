use crate::api::ChatMessage;
use crate::errors::GatewayError;
use crate::gateway::{Capability, ModelGateway};
use crate::prompts;

use super::types::{
    ConfidenceSource, GenerationResult, ModelUsageRecord, PURPOSE_SYNTHESIS, PromptAnalysis,
    SYNTHESIS_CONFIDENCE,
};

/// Merges primary and alternative output into the final answer.
pub async fn synthesize(
    gateway: &dyn ModelGateway,
    prompt: &str,
    analysis: &PromptAnalysis,
    primary: &GenerationResult,
    alternative: Option<&GenerationResult>,
) -> Result<(GenerationResult, ModelUsageRecord), GatewayError> {
    let messages = [
        ChatMessage::system(prompts::SYNTHESIS_SYSTEM),
        ChatMessage::user(prompts::synthesis_request(prompt, analysis, primary, alternative)),
    ];

    let completion = gateway.chat_complete(&messages, None).await?;
    let usage = ModelUsageRecord {
        model_name: gateway.model_name(Capability::Chat),
        purpose: PURPOSE_SYNTHESIS.to_string(),
        tokens_consumed: completion.tokens_consumed,
        confidence: ConfidenceSource::Assumed(SYNTHESIS_CONFIDENCE),
    };
    Ok((
        GenerationResult::new(completion.content, completion.tokens_consumed),
        usage,
    ))
}
