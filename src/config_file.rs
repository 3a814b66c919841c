use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const PROVIDER_CONFIG_PATH: &str = ".pencil/provider.json";

/// Per-provider configuration settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Model name/ID (MODEL env var and CLI override win over this)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Maximum tokens in response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Alternate API endpoint (proxies, self-hosted Ollama)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Custom settings per provider
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Provider configuration file schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Active chat provider (overrides API key detection)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic: Option<ProviderSettings>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<ProviderSettings>,

    /// Local/Ollama-specific settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<ProviderSettings>,

    /// Image providers in the order they are tried, e.g. `["openai", "pollinations"]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_providers: Option<Vec<String>>,

    /// Default settings applied to all providers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<ProviderSettings>,
}

impl ProviderConfig {
    /// Load config from `.pencil/provider.json`; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(PROVIDER_CONFIG_PATH))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Get settings for a specific provider
    pub fn get_provider_settings(&self, provider_name: &str) -> Option<&ProviderSettings> {
        match provider_name {
            "anthropic" => self.anthropic.as_ref(),
            "openai" => self.openai.as_ref(),
            "local" | "ollama" => self.local.as_ref(),
            _ => None,
        }
    }

    /// Merge provider-specific settings with defaults
    pub fn merged_settings(&self, provider_name: &str) -> ProviderSettings {
        let mut merged = self.defaults.clone().unwrap_or_default();

        if let Some(provider_settings) = self.get_provider_settings(provider_name) {
            if let Some(model) = &provider_settings.model {
                merged.model = Some(model.clone());
            }
            if let Some(max_tokens) = provider_settings.max_tokens {
                merged.max_tokens = Some(max_tokens);
            }
            if let Some(temperature) = provider_settings.temperature {
                merged.temperature = Some(temperature);
            }
            if let Some(base_url) = &provider_settings.base_url {
                merged.base_url = Some(base_url.clone());
            }
            for (k, v) in &provider_settings.extra {
                merged.extra.insert(k.clone(), v.clone());
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_merge() {
        let config = ProviderConfig {
            provider: Some("anthropic".to_string()),
            defaults: Some(ProviderSettings {
                max_tokens: Some(8192),
                temperature: Some(0.3),
                ..Default::default()
            }),
            anthropic: Some(ProviderSettings {
                model: Some("claude-3-5-haiku-latest".to_string()),
                temperature: Some(0.9),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = config.merged_settings("anthropic");
        assert_eq!(merged.model, Some("claude-3-5-haiku-latest".to_string()));
        assert_eq!(merged.max_tokens, Some(8192));
        assert_eq!(merged.temperature, Some(0.9));
    }

    #[test]
    fn test_ollama_alias_reads_local_section() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{ "local": { "model": "llama3.2", "base_url": "http://gpu-box:11434" } }"#,
        )
        .unwrap();
        let merged = config.merged_settings("ollama");
        assert_eq!(merged.model.as_deref(), Some("llama3.2"));
        assert_eq!(merged.base_url.as_deref(), Some("http://gpu-box:11434"));
    }

    #[test]
    fn test_unknown_fields_land_in_extra() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{ "openai": { "organization": "org-1" } }"#).unwrap();
        let merged = config.merged_settings("openai");
        assert_eq!(merged.extra["organization"], "org-1");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig::load_from(&dir.path().join("provider.json")).unwrap();
        assert!(config.provider.is_none());
        assert!(config.image_providers.is_none());
    }
}
