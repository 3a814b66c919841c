use serde_json::{Value, json};
use std::time::Duration;

use crate::errors::GatewayError;

use super::{InferenceRequest, InferenceResponse, LLMProvider, ProviderHttpClient, Usage, check_status};
use crate::types::ModelId;

pub fn default_host() -> String {
    std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string())
}

pub struct LocalProvider {
    http: ProviderHttpClient,
    host: String,
    model: ModelId,
}

impl LocalProvider {
    pub fn new() -> Result<Self, GatewayError> {
        let model = std::env::var("MODEL")
            .or_else(|_| std::env::var("OLLAMA_MODEL"))
            .ok()
            .map(ModelId::new);
        Self::new_with_model(model)
    }

    pub fn new_with_model(model: Option<ModelId>) -> Result<Self, GatewayError> {
        let http = ProviderHttpClient::default()?;

        let model = match model {
            Some(model) => model,
            None => std::env::var("OLLAMA_MODEL")
                .ok()
                .or_else(|| std::env::var("MODEL").ok())
                .map(ModelId::new)
                .ok_or_else(|| {
                    GatewayError::Config(
                        "No local model configured. Set MODEL or OLLAMA_MODEL, or configure .pencil/provider.json"
                            .to_string(),
                    )
                })?,
        };

        Ok(Self {
            http,
            host: default_host(),
            model,
        })
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn is_available(host: &str) -> bool {
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
        {
            Ok(c) => c,
            Err(_) => return false,
        };

        match client.get(format!("{host}/api/tags")).send().await {
            Ok(res) => res.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for LocalProvider {
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

        let mut options = json!({ "num_predict": req.max_tokens });
        if let Some(temp) = req.temperature {
            options["temperature"] = json!(temp);
        }
        let body = json!({
            "model": req.model.as_str(),
            "messages": messages,
            "stream": false,
            "options": options,
        });

        let res = self
            .http
            .client()
            .post(format!("{}/api/chat", self.host))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let res = check_status("ollama", res).await?;
        let response_json: Value = res.json().await?;

        let content = response_json
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                GatewayError::InvalidResponse("No message content in response".to_string())
            })?
            .trim()
            .to_string();

        let usage = Usage {
            input_tokens: response_json
                .get("prompt_eval_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            output_tokens: response_json
                .get("eval_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
        };

        let stop_reason = response_json
            .get("done_reason")
            .and_then(|v| v.as_str())
            .unwrap_or("stop")
            .to_string();

        Ok(InferenceResponse {
            content,
            stop_reason,
            usage,
        })
    }

    fn name(&self) -> &str {
        "local"
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    fn validate_config(&self) -> Result<(), GatewayError> {
        if self.host.is_empty() {
            return Err(GatewayError::Config("Ollama host is empty".to_string()));
        }
        Ok(())
    }
}
