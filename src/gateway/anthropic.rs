use serde_json::{Value, json};

use crate::errors::GatewayError;

use super::{InferenceRequest, InferenceResponse, LLMProvider, ProviderHttpClient, Usage, check_status};
use crate::types::ModelId;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicProvider {
    http: ProviderHttpClient,
    key: String,
    model: ModelId,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(key: String) -> Result<Self, GatewayError> {
        let model = std::env::var("MODEL").ok().map(ModelId::new);
        Self::new_with_model(key, model)
    }

    pub fn new_with_model(key: String, model: Option<ModelId>) -> Result<Self, GatewayError> {
        let http = ProviderHttpClient::default()?;

        let model = model.unwrap_or_else(ModelId::claude_sonnet);

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
}

#[async_trait::async_trait]
impl LLMProvider for AnthropicProvider {
    async fn infer(&self, req: &InferenceRequest) -> Result<InferenceResponse, GatewayError> {
        let mut body = json!({
            "model": req.model.as_str(),
            "max_tokens": req.max_tokens,
            "messages": req.messages,
        });
        if !req.system.is_empty() {
            body["system"] = json!(req.system);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = json!(temp);
        }

        let res = self
            .http
            .client()
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let res = check_status("anthropic", res).await?;
        let response_json: Value = res.json().await?;

        let content_arr = response_json["content"].as_array().ok_or_else(|| {
            GatewayError::InvalidResponse(
                "Unexpected API response: missing 'content' array".to_string(),
            )
        })?;

        let text = content_arr
            .iter()
            .filter(|block| block.get("type").and_then(|v| v.as_str()) == Some("text"))
            .filter_map(|block| block.get("text").and_then(|v| v.as_str()))
            .collect::<Vec<_>>()
            .join("");

        let stop_reason = response_json
            .get("stop_reason")
            .and_then(|v| v.as_str())
            .unwrap_or("end_turn")
            .to_string();

        let usage = response_json
            .get("usage")
            .map(|usage_obj| Usage {
                input_tokens: usage_obj
                    .get("input_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
                output_tokens: usage_obj
                    .get("output_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        Ok(InferenceResponse {
            content: text,
            stop_reason,
            usage,
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    fn validate_config(&self) -> Result<(), GatewayError> {
        if self.key.is_empty() {
            return Err(GatewayError::Config(
                "Anthropic API key is empty".to_string(),
            ));
        }
        Ok(())
    }
}
