//! Image generation backends and the ordered fallback chain over them.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use reqwest::Url;

use super::{ProviderHttpClient, check_status};
use crate::config_file::ProviderConfig;
use crate::errors::GatewayError;
use crate::types::ModelId;

const POLLINATIONS_BASE_URL: &str = "https://image.pollinations.ai";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub provider: String,
}

#[async_trait::async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage, GatewayError>;
}

/// OpenAI Images API (`/v1/images/generations`).
pub struct OpenAIImageProvider {
    http: ProviderHttpClient,
    key: String,
    model: ModelId,
    base_url: String,
}

impl OpenAIImageProvider {
    pub fn new(key: String) -> Result<Self, GatewayError> {
        Ok(Self {
            http: ProviderHttpClient::default()?,
            key,
            model: ModelId::dall_e_3(),
            base_url: super::openai::DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model = model;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl ImageProvider for OpenAIImageProvider {
    fn name(&self) -> &str {
        "openai-images"
    }

    async fn generate(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage, GatewayError> {
        let body = json!({
            "model": self.model.as_str(),
            "prompt": prompt,
            "n": 1,
            "size": format!("{width}x{height}"),
        });

        let res = self
            .http
            .client()
            .post(format!("{}/v1/images/generations", self.base_url))
            .bearer_auth(&self.key)
            .json(&body)
            .send()
            .await?;
        let res = check_status("openai-images", res).await?;
        let response_json: Value = res.json().await?;

        let first = response_json
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|d| d.first())
            .ok_or_else(|| GatewayError::InvalidResponse("No image data in response".to_string()))?;

        // gpt-image models only return inline base64.
        let url = if let Some(url) = first.get("url").and_then(|v| v.as_str()) {
            url.to_string()
        } else if let Some(b64) = first.get("b64_json").and_then(|v| v.as_str()) {
            format!("data:image/png;base64,{b64}")
        } else {
            return Err(GatewayError::InvalidResponse(
                "Image entry has neither url nor b64_json".to_string(),
            ));
        };

        Ok(GeneratedImage {
            url,
            width,
            height,
            provider: self.name().to_string(),
        })
    }
}

/// Keyless provider: the image is rendered lazily when the URL is fetched.
pub struct PollinationsProvider {
    base_url: String,
}

impl PollinationsProvider {
    pub fn new() -> Self {
        Self {
            base_url: POLLINATIONS_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn image_url(&self, prompt: &str, width: u32, height: u32) -> Result<String, GatewayError> {
        if prompt.trim().is_empty() {
            return Err(GatewayError::Config("image prompt is empty".to_string()));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GatewayError::Config(format!("invalid pollinations url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::Config("pollinations url cannot be a base".to_string()))?
            .pop_if_empty()
            .push("prompt")
            .push(prompt.trim());
        url.query_pairs_mut()
            .append_pair("width", &width.to_string())
            .append_pair("height", &height.to_string())
            .append_pair("nologo", "true");
        Ok(url.to_string())
    }
}

impl Default for PollinationsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ImageProvider for PollinationsProvider {
    fn name(&self) -> &str {
        "pollinations"
    }

    async fn generate(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage, GatewayError> {
        Ok(GeneratedImage {
            url: self.image_url(prompt, width, height)?,
            width,
            height,
            provider: self.name().to_string(),
        })
    }
}

/// Tries providers in order; the first success wins.
pub struct ImageFallbackChain {
    providers: Vec<Box<dyn ImageProvider>>,
}

impl ImageFallbackChain {
    pub fn new(providers: Vec<Box<dyn ImageProvider>>) -> Self {
        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names joined in try order, e.g. `openai-images -> pollinations`.
    pub fn describe(&self) -> String {
        self.providers
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub async fn generate(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage, GatewayError> {
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            match provider.generate(prompt, width, height).await {
                Ok(image) => {
                    if !attempts.is_empty() {
                        log::info!(
                            "image generated by {} after {} failed attempt(s)",
                            provider.name(),
                            attempts.len()
                        );
                    }
                    return Ok(image);
                }
                Err(e) => {
                    log::warn!("image provider {} failed: {e}", provider.name());
                    attempts.push(format!("{}: {}", provider.name(), e.code()));
                }
            }
        }

        Err(GatewayError::ProvidersExhausted { attempts })
    }
}

/// Builds the chain from `image_providers` in provider.json, or the default order:
/// OpenAI Images when `OPENAI_API_KEY` is set, then Pollinations.
pub fn create_image_chain(config: &ProviderConfig) -> Result<ImageFallbackChain, GatewayError> {
    let openai_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
    let order = config.image_providers.clone().unwrap_or_else(|| {
        let mut order = Vec::new();
        if openai_key.is_some() {
            order.push("openai".to_string());
        }
        order.push("pollinations".to_string());
        order
    });

    let mut providers: Vec<Box<dyn ImageProvider>> = Vec::with_capacity(order.len());
    for name in &order {
        match name.to_lowercase().as_str() {
            "openai" | "openai-images" | "dalle" => {
                let Some(key) = openai_key.clone() else {
                    log::warn!("skipping openai image provider: OPENAI_API_KEY not set");
                    continue;
                };
                let mut provider = OpenAIImageProvider::new(key)?;
                if let Some(url) = config.merged_settings("openai").base_url {
                    provider = provider.with_base_url(url);
                }
                providers.push(Box::new(provider));
            }
            "pollinations" => providers.push(Box::new(PollinationsProvider::new())),
            other => {
                return Err(GatewayError::Config(format!("Unknown image provider: {other}")));
            }
        }
    }

    if providers.is_empty() {
        return Err(GatewayError::Config(
            "no usable image providers configured".to_string(),
        ));
    }
    Ok(ImageFallbackChain::new(providers))
}
