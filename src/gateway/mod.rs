use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub mod anthropic;
pub mod image;
pub mod local;
pub mod openai;

use crate::api::{ChatMessage, split_system};
use crate::config_file::ProviderConfig;
use crate::errors::GatewayError;
use crate::prompts;
use crate::types::ModelId;
use reqwest::{Client, Response, StatusCode};

pub use image::{
    GeneratedImage, ImageFallbackChain, ImageProvider, OpenAIImageProvider, PollinationsProvider,
    create_image_chain,
};

pub(crate) struct ProviderHttpClient {
    client: Client,
}

impl ProviderHttpClient {
    pub fn new(timeout_secs: u64) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    pub fn default() -> Result<Self, GatewayError> {
        Self::new(120)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Maps a non-success HTTP response to a `GatewayError`.
pub(crate) async fn check_status(
    provider: &'static str,
    res: Response,
) -> Result<Response, GatewayError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = res
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(GatewayError::RateLimited {
            provider,
            retry_after,
        });
    }

    let message = res.text().await.unwrap_or_default();
    Err(GatewayError::Api {
        provider,
        status: status.as_u16(),
        message,
    })
}

/// Request structure for LLM inference
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub model: ModelId,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub system: String,
}

/// Response structure from LLM inference
#[derive(Debug, Clone)]
pub struct InferenceResponse {
    pub content: String,
    pub stop_reason: String,
    pub usage: Usage,
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Trait for chat-completion backends
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    /// Run inference with the given request
    async fn infer(&self, req: &InferenceRequest) -> Result<InferenceResponse, GatewayError>;

    /// Get the name of this provider
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &ModelId;

    /// Validate that this provider is properly configured
    fn validate_config(&self) -> Result<(), GatewayError>;
}

/// Generation capabilities a gateway exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Chat,
    Code,
    Image,
}

/// Text produced by a chat or code call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tokens_consumed: u32,
    pub model: ModelId,
}

/// Uniform interface the pipeline and single-shot modes talk to.
#[async_trait::async_trait]
pub trait ModelGateway: Send + Sync {
    async fn chat_complete(
        &self,
        messages: &[ChatMessage],
        model_hint: Option<&ModelId>,
    ) -> Result<Completion, GatewayError>;

    async fn generate_code(
        &self,
        prompt: &str,
        model_hint: Option<&ModelId>,
    ) -> Result<Completion, GatewayError> {
        let messages = [
            ChatMessage::system(prompts::CODE_GENERATION_SYSTEM),
            ChatMessage::user(prompt),
        ];
        self.chat_complete(&messages, model_hint).await
    }

    async fn generate_image(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage, GatewayError>;

    /// Display name of the model serving a capability, recorded on processing steps.
    fn model_name(&self, capability: Capability) -> String;
}

/// Gateway backed by one chat provider and an ordered image provider chain.
pub struct ProviderGateway {
    chat: Box<dyn LLMProvider>,
    images: ImageFallbackChain,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl ProviderGateway {
    pub fn new(chat: Box<dyn LLMProvider>, images: ImageFallbackChain) -> Self {
        Self {
            chat,
            images,
            max_tokens: 4096,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.chat.name()
    }
}

#[async_trait::async_trait]
impl ModelGateway for ProviderGateway {
    async fn chat_complete(
        &self,
        messages: &[ChatMessage],
        model_hint: Option<&ModelId>,
    ) -> Result<Completion, GatewayError> {
        let model = model_hint.unwrap_or_else(|| self.chat.model()).clone();
        let (system, messages) = split_system(messages);
        let req = InferenceRequest {
            model: model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
        };

        log::debug!(
            "chat_complete provider={} model={} turns={}",
            self.chat.name(),
            model,
            req.messages.len()
        );
        let resp = self.chat.infer(&req).await?;
        log::debug!(
            "chat_complete done stop_reason={} tokens={}",
            resp.stop_reason,
            resp.usage.total()
        );

        Ok(Completion {
            content: resp.content,
            tokens_consumed: resp.usage.total(),
            model,
        })
    }

    async fn generate_image(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage, GatewayError> {
        self.images.generate(prompt, width, height).await
    }

    fn model_name(&self, capability: Capability) -> String {
        match capability {
            Capability::Chat | Capability::Code => {
                format!("{}/{}", self.chat.name(), self.chat.model())
            }
            Capability::Image => self.images.describe(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderOverrides {
    /// Model override (e.g. from CLI -m/--model)
    pub model: Option<ModelId>,
    /// Provider override (e.g. from CLI --provider)
    pub provider: Option<String>,
}

/// Create a chat provider based on configuration priority:
/// 1. CLI override, then the PROVIDER environment variable
/// 2. .pencil/provider.json config file
/// 3. Auto-detection from available API keys
/// 4. Try local Ollama
/// 5. Error if none found
pub async fn create_provider() -> Result<Box<dyn LLMProvider>, GatewayError> {
    create_provider_with_overrides(ProviderOverrides::default()).await
}

pub async fn create_provider_with_overrides(
    overrides: ProviderOverrides,
) -> Result<Box<dyn LLMProvider>, GatewayError> {
    let _ = dotenvy::dotenv();

    let config_file = match ProviderConfig::load() {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("ignoring unreadable provider config: {e}");
            None
        }
    };

    if let Some(provider_name) = overrides.provider.clone().or_else(|| env::var("PROVIDER").ok()) {
        return create_provider_by_name(&provider_name, config_file.as_ref(), overrides);
    }

    if let Some(provider_name) = config_file.as_ref().and_then(|c| c.provider.clone()) {
        return create_provider_by_name(&provider_name, config_file.as_ref(), overrides);
    }

    if env::var("ANTHROPIC_API_KEY").is_ok() {
        return create_provider_by_name("anthropic", config_file.as_ref(), overrides);
    }

    if env::var("OPENAI_API_KEY").is_ok() {
        return create_provider_by_name("openai", config_file.as_ref(), overrides);
    }

    let local_host = config_file
        .as_ref()
        .and_then(|c| c.merged_settings("local").base_url)
        .unwrap_or_else(local::default_host);
    if local::LocalProvider::is_available(&local_host).await {
        return create_provider_by_name("local", config_file.as_ref(), overrides);
    }

    Err(GatewayError::NoProviderConfigured)
}

/// Override, then MODEL env, then the provider's entry in provider.json.
fn resolve_model(
    provider: &str,
    config_file: Option<&ProviderConfig>,
    overrides: &ProviderOverrides,
) -> Option<ModelId> {
    let cfg_model = config_file
        .and_then(|c| c.merged_settings(provider).model)
        .map(ModelId::new);
    overrides
        .model
        .clone()
        .or(env::var("MODEL").ok().map(ModelId::new))
        .or(cfg_model)
}

/// Create a provider by explicit name
fn create_provider_by_name(
    name: &str,
    config_file: Option<&ProviderConfig>,
    overrides: ProviderOverrides,
) -> Result<Box<dyn LLMProvider>, GatewayError> {
    let name = name.to_lowercase();
    let canonical = match name.as_str() {
        "ollama" => "local",
        other => other,
    };
    let settings = config_file
        .map(|c| c.merged_settings(canonical))
        .unwrap_or_default();
    let model = resolve_model(canonical, config_file, &overrides);

    let provider: Box<dyn LLMProvider> = match canonical {
        "anthropic" => {
            let key = env::var("ANTHROPIC_API_KEY")
                .map_err(|_| GatewayError::MissingApiKey("anthropic".to_string()))?;
            let mut provider = anthropic::AnthropicProvider::new_with_model(key, model)?;
            if let Some(url) = settings.base_url {
                provider = provider.with_base_url(url);
            }
            Box::new(provider)
        }
        "openai" => {
            let key = env::var("OPENAI_API_KEY")
                .map_err(|_| GatewayError::MissingApiKey("openai".to_string()))?;
            let mut provider = openai::OpenAIProvider::new_with_model(key, model)?;
            if let Some(url) = settings.base_url {
                provider = provider.with_base_url(url);
            }
            Box::new(provider)
        }
        "local" => {
            let mut provider = local::LocalProvider::new_with_model(model)?;
            if let Some(url) = settings.base_url {
                provider = provider.with_host(url);
            }
            Box::new(provider)
        }
        other => return Err(GatewayError::Config(format!("Unknown provider: {other}"))),
    };

    provider.validate_config()?;
    log::info!("using provider {} ({})", provider.name(), provider.model());
    Ok(provider)
}

/// Builds the full gateway: chat provider selection plus the image fallback chain.
pub async fn create_gateway(overrides: ProviderOverrides) -> Result<ProviderGateway, GatewayError> {
    let chat = create_provider_with_overrides(overrides).await?;
    let config_file = ProviderConfig::load().unwrap_or_default();
    let settings = config_file.merged_settings(chat.name());
    let images = create_image_chain(&config_file)?;

    let mut gateway = ProviderGateway::new(chat, images);
    if let Some(max_tokens) = settings.max_tokens {
        gateway = gateway.with_max_tokens(max_tokens);
    }
    Ok(gateway.with_temperature(settings.temperature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingProvider {
        model: ModelId,
        seen: Arc<Mutex<Vec<InferenceRequest>>>,
    }

    #[async_trait::async_trait]
    impl LLMProvider for RecordingProvider {
        async fn infer(&self, req: &InferenceRequest) -> Result<InferenceResponse, GatewayError> {
            self.seen.lock().unwrap().push(req.clone());
            Ok(InferenceResponse {
                content: format!("echo: {}", req.messages.last().map(|m| m.content.as_str()).unwrap_or("")),
                stop_reason: "stop".to_string(),
                usage: Usage {
                    input_tokens: 7,
                    output_tokens: 5,
                },
            })
        }

        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &ModelId {
            &self.model
        }

        fn validate_config(&self) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn gateway() -> (ProviderGateway, Arc<Mutex<Vec<InferenceRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let provider = RecordingProvider {
            model: ModelId::new("rec-1"),
            seen: seen.clone(),
        };
        let images = ImageFallbackChain::new(vec![Box::new(PollinationsProvider::new())]);
        (ProviderGateway::new(Box::new(provider), images), seen)
    }

    #[tokio::test]
    async fn chat_complete_moves_system_turns_and_sums_tokens() {
        let (gateway, seen) = gateway();
        let completion = gateway
            .chat_complete(
                &[ChatMessage::system("be brief"), ChatMessage::user("hi")],
                None,
            )
            .await
            .unwrap();

        assert_eq!(completion.content, "echo: hi");
        assert_eq!(completion.tokens_consumed, 12);
        assert_eq!(completion.model.as_str(), "rec-1");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].system, "be brief");
        assert_eq!(seen[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn model_hint_overrides_provider_model() {
        let (gateway, seen) = gateway();
        let hint = ModelId::new("other-model");
        let completion = gateway
            .chat_complete(&[ChatMessage::user("hi")], Some(&hint))
            .await
            .unwrap();
        assert_eq!(completion.model, hint);
        assert_eq!(seen.lock().unwrap()[0].model, hint);
    }

    #[tokio::test]
    async fn generate_code_uses_code_system_prompt() {
        let (gateway, seen) = gateway();
        gateway.generate_code("reverse a string", None).await.unwrap();
        assert_eq!(seen.lock().unwrap()[0].system, prompts::CODE_GENERATION_SYSTEM);
    }

    #[test]
    fn model_name_per_capability() {
        let (gateway, _) = gateway();
        assert_eq!(gateway.model_name(Capability::Chat), "recording/rec-1");
        assert_eq!(gateway.model_name(Capability::Image), "pollinations");
    }

    #[test]
    fn usage_total_saturates() {
        let usage = Usage {
            input_tokens: u32::MAX,
            output_tokens: 1,
        };
        assert_eq!(usage.total(), u32::MAX);
    }
}
