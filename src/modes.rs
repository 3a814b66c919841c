//! Single-shot generation outside Super Mode: one gateway call each.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::api::ChatMessage;
use crate::errors::GatewayError;
use crate::gateway::{Capability, GeneratedImage, ModelGateway};
use crate::pipeline::generator::ImageSize;
use crate::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Super,
    Chat,
    Code,
    Image,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Super => "super",
            Mode::Chat => "chat",
            Mode::Code => "code",
            Mode::Image => "image",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "super" => Ok(Mode::Super),
            "chat" | "text" => Ok(Mode::Chat),
            "code" => Ok(Mode::Code),
            "image" => Ok(Mode::Image),
            other => Err(format!("unknown mode '{other}' (expected super, chat, code or image)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeResult {
    pub mode: Mode,
    pub content: String,
    pub tokens_consumed: u32,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<GeneratedImage>,
}

/// Plain chat with prior turns. `history` excludes the new prompt.
pub async fn chat(
    gateway: &dyn ModelGateway,
    history: &[ChatMessage],
    prompt: &str,
) -> Result<ModeResult, GatewayError> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(prompts::CHAT_SYSTEM));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(prompt));

    let completion = gateway.chat_complete(&messages, None).await?;
    Ok(ModeResult {
        mode: Mode::Chat,
        content: completion.content,
        tokens_consumed: completion.tokens_consumed,
        model: completion.model.to_string(),
        image: None,
    })
}

pub async fn code(gateway: &dyn ModelGateway, prompt: &str) -> Result<ModeResult, GatewayError> {
    let completion = gateway.generate_code(prompt, None).await?;
    Ok(ModeResult {
        mode: Mode::Code,
        content: completion.content,
        tokens_consumed: completion.tokens_consumed,
        model: completion.model.to_string(),
        image: None,
    })
}

pub async fn image(
    gateway: &dyn ModelGateway,
    prompt: &str,
    size: ImageSize,
) -> Result<ModeResult, GatewayError> {
    let image = gateway
        .generate_image(prompt, size.width, size.height)
        .await?;
    Ok(ModeResult {
        mode: Mode::Image,
        content: image.url.clone(),
        tokens_consumed: 0,
        model: gateway.model_name(Capability::Image),
        image: Some(image),
    })
}

/// Races a single-shot request against `cancel`. `None` means it was cancelled.
pub async fn run_cancellable<F>(
    cancel: &CancellationToken,
    work: F,
) -> Option<Result<ModeResult, GatewayError>>
where
    F: Future<Output = Result<ModeResult, GatewayError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        res = work => Some(res),
    }
}
