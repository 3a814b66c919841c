use crate::api::ChatMessage;
use crate::errors::GatewayError;
use crate::gateway::ModelGateway;
use crate::prompts;
use crate::types::ResponseType;

use super::types::{GenerationResult, PromptAnalysis};

/// Image dimensions for the image branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
        }
    }
}

/// Primary generation, dispatched on the analyzed response type.
///
/// Records no usage: primary confidence is not measured.
pub async fn generate_primary(
    gateway: &dyn ModelGateway,
    analysis: &PromptAnalysis,
    image_size: ImageSize,
) -> Result<GenerationResult, GatewayError> {
    match analysis.response_type {
        ResponseType::Code => {
            let completion = gateway.generate_code(&analysis.enhanced_prompt, None).await?;
            Ok(GenerationResult::new(completion.content, completion.tokens_consumed))
        }
        ResponseType::Image => {
            let image = gateway
                .generate_image(&analysis.enhanced_prompt, image_size.width, image_size.height)
                .await?;
            Ok(GenerationResult::from_image(image))
        }
        ResponseType::Text => {
            let messages = [
                ChatMessage::system(prompts::COMPREHENSIVE_SYSTEM),
                ChatMessage::user(analysis.enhanced_prompt.as_str()),
            ];
            let completion = gateway.chat_complete(&messages, None).await?;
            Ok(GenerationResult::new(completion.content, completion.tokens_consumed))
        }
    }
}
