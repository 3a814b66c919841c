use crate::api::ChatMessage;
use crate::errors::GatewayError;
use crate::gateway::{Capability, ModelGateway};
use crate::prompts;
use crate::types::ResponseType;

use super::types::{
    ALTERNATIVE_CONFIDENCE, ConfidenceSource, GenerationResult, ModelUsageRecord,
    PURPOSE_ALTERNATIVE, PromptAnalysis,
};

/// Second pass over a code or text request. Never called for images.
///
/// The gateway reports no confidence, so the usage sample is an assumed constant.
pub async fn generate_alternative(
    gateway: &dyn ModelGateway,
    analysis: &PromptAnalysis,
    primary: &GenerationResult,
) -> Result<(GenerationResult, ModelUsageRecord), GatewayError> {
    let messages = match analysis.response_type {
        ResponseType::Code => [
            ChatMessage::system(prompts::CODE_REVIEW_SYSTEM),
            ChatMessage::user(prompts::code_review_request(
                &analysis.enhanced_prompt,
                &primary.content,
            )),
        ],
        ResponseType::Text | ResponseType::Image => [
            ChatMessage::system(prompts::ALTERNATIVE_PERSPECTIVE_SYSTEM),
            ChatMessage::user(prompts::alternative_perspective_request(
                &analysis.enhanced_prompt,
            )),
        ],
    };

    let completion = gateway.chat_complete(&messages, None).await?;
    let usage = ModelUsageRecord {
        model_name: gateway.model_name(Capability::Chat),
        purpose: PURPOSE_ALTERNATIVE.to_string(),
        tokens_consumed: completion.tokens_consumed,
        confidence: ConfidenceSource::Assumed(ALTERNATIVE_CONFIDENCE),
    };
    Ok((
        GenerationResult::new(completion.content, completion.tokens_consumed),
        usage,
    ))
}
