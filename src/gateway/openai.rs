use serde_json::{Value, json};

use crate::errors::GatewayError;
use crate::types::ModelId;

use super::{InferenceRequest, InferenceResponse, LLMProvider, ProviderHttpClient, Usage, check_status};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAIProvider {
    http: ProviderHttpClient,
    key: String,
    model: ModelId,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(key: String) -> Result<Self, GatewayError> {
        let model = std::env::var("MODEL").ok().map(ModelId::new);
        Self::new_with_model(key, model)
    }

    pub fn new_with_model(key: String, model: Option<ModelId>) -> Result<Self, GatewayError> {
        let http = ProviderHttpClient::default()?;
        let model = model.unwrap_or_else(ModelId::gpt_5_mini);

        Ok(Self {
            http,
            key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn is_reasoning_model(model: &str) -> bool {
        model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4")
    }

    fn supports_temperature(model: &str) -> bool {
        !Self::is_reasoning_model(model) && !model.starts_with("gpt-5")
    }
}

#[async_trait::async_trait]
impl LLMProvider for OpenAIProvider {
    async fn infer(&self, req: &InferenceRequest) -> Result<InferenceResponse, GatewayError> {
        let mut messages = Vec::with_capacity(req.messages.len() + 1);
        if !req.system.is_empty() {
            messages.push(json!({ "role": "system", "content": req.system }));
        }
        messages.extend(
            req.messages
                .iter()
                .map(|m| json!({ "role": m.role.as_str(), "content": m.content })),
        );

        let mut body = json!({
            "model": req.model.as_str(),
            "max_completion_tokens": req.max_tokens,
            "messages": messages,
        });
        if let Some(temp) = req.temperature {
            if Self::supports_temperature(req.model.as_str()) {
                body["temperature"] = json!(temp);
            }
        }

        let res = self
            .http
            .client()
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let res = check_status("openai", res).await?;
        let response_json: Value = res.json().await?;

        let choice = response_json
            .get("choices")
            .and_then(|arr| arr.as_array())
            .and_then(|arr| arr.first())
            .ok_or_else(|| GatewayError::InvalidResponse("No choices in response".to_string()))?;

        let content = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::InvalidResponse("No message content in choice".to_string()))?
            .to_string();

        let stop_reason = choice
            .get("finish_reason")
            .and_then(|v| v.as_str())
            .unwrap_or("stop")
            .to_string();

        let usage = response_json
            .get("usage")
            .map(|usage_obj| Usage {
                input_tokens: usage_obj
                    .get("prompt_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
                output_tokens: usage_obj
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        Ok(InferenceResponse {
            content,
            stop_reason,
            usage,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    fn validate_config(&self) -> Result<(), GatewayError> {
        if self.key.is_empty() {
            return Err(GatewayError::Config("OpenAI API key is empty".to_string()));
        }
        Ok(())
    }
}
