use std::sync::{Mutex, OnceLock};

use tempfile::TempDir;

use pencil_ai::{GatewayError, ModelId, ProviderOverrides, create_provider_with_overrides};

static TEST_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const MANAGED_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "PROVIDER",
    "MODEL",
    "OLLAMA_HOST",
    "OLLAMA_MODEL",
];

/// Serializes env and cwd mutation; restores both on drop.
struct EnvDirGuard {
    _lock: std::sync::MutexGuard<'static, ()>,
    cwd: std::path::PathBuf,
    saved: Vec<(&'static str, Option<String>)>,
    _tmp: TempDir,
}

impl EnvDirGuard {
    fn new() -> Self {
        let lock = TEST_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let cwd = std::env::current_dir().unwrap();
        let saved = MANAGED_VARS
            .iter()
            .map(|name| (*name, std::env::var(name).ok()))
            .collect();

        // SAFETY: env mutation is guarded by TEST_LOCK.
        unsafe {
            for name in MANAGED_VARS {
                std::env::remove_var(name);
            }
            // Keep the Ollama probe away from any real local server.
            std::env::set_var("OLLAMA_HOST", "http://127.0.0.1:9");
        }

        let tmp = TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        Self {
            _lock: lock,
            cwd,
            saved,
            _tmp: tmp,
        }
    }

    fn set(&self, name: &str, value: &str) {
        // SAFETY: env mutation is guarded by TEST_LOCK.
        unsafe {
            std::env::set_var(name, value);
        }
    }

    fn write_provider_json(&self, json: &str) {
        let dir = self._tmp.path().join(".pencil");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("provider.json"), json).unwrap();
    }
}

impl Drop for EnvDirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.cwd);

        // SAFETY: env mutation is guarded by TEST_LOCK.
        unsafe {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => std::env::set_var(name, v),
                    None => std::env::remove_var(name),
                }
            }
        }
    }
}

const OPENAI_CONFIG: &str = r#"{
  "provider": "openai",
  "openai": { "model": "gpt-4.1-mini" }
}"#;

#[tokio::test]
async fn provider_json_model_used_when_no_env_or_override() {
    let env = EnvDirGuard::new();
    env.set("OPENAI_API_KEY", "test");
    env.write_provider_json(OPENAI_CONFIG);

    let provider = create_provider_with_overrides(ProviderOverrides::default())
        .await
        .unwrap();

    assert_eq!(provider.name(), "openai");
    assert_eq!(provider.model().as_str(), "gpt-4.1-mini");
}

#[tokio::test]
async fn env_model_overrides_provider_json() {
    let env = EnvDirGuard::new();
    env.set("OPENAI_API_KEY", "test");
    env.set("MODEL", "gpt-4o-mini");
    env.write_provider_json(OPENAI_CONFIG);

    let provider = create_provider_with_overrides(ProviderOverrides::default())
        .await
        .unwrap();

    assert_eq!(provider.model().as_str(), "gpt-4o-mini");
}

#[tokio::test]
async fn override_model_beats_env_and_provider_json() {
    let env = EnvDirGuard::new();
    env.set("OPENAI_API_KEY", "test");
    env.set("MODEL", "gpt-4o-mini");
    env.write_provider_json(OPENAI_CONFIG);

    let provider = create_provider_with_overrides(ProviderOverrides {
        model: Some(ModelId::new("gpt-5-mini-override")),
        provider: None,
    })
    .await
    .unwrap();

    assert_eq!(provider.model().as_str(), "gpt-5-mini-override");
}

#[tokio::test]
async fn override_provider_beats_provider_json() {
    let env = EnvDirGuard::new();
    env.set("OPENAI_API_KEY", "test");
    env.set("ANTHROPIC_API_KEY", "test");
    env.write_provider_json(OPENAI_CONFIG);

    let provider = create_provider_with_overrides(ProviderOverrides {
        model: None,
        provider: Some("anthropic".to_string()),
    })
    .await
    .unwrap();

    assert_eq!(provider.name(), "anthropic");
    assert_eq!(provider.model().as_str(), "claude-3-5-sonnet-latest");
}

#[tokio::test]
async fn anthropic_key_wins_auto_detection() {
    let env = EnvDirGuard::new();
    env.set("OPENAI_API_KEY", "test");
    env.set("ANTHROPIC_API_KEY", "test");

    let provider = create_provider_with_overrides(ProviderOverrides::default())
        .await
        .unwrap();

    assert_eq!(provider.name(), "anthropic");
}

#[tokio::test]
async fn openai_default_model_is_gpt_5_mini() {
    let env = EnvDirGuard::new();
    env.set("OPENAI_API_KEY", "test");
    env.set("PROVIDER", "openai");

    let provider = create_provider_with_overrides(ProviderOverrides::default())
        .await
        .unwrap();

    assert_eq!(provider.model().as_str(), "gpt-5-mini");
}

#[tokio::test]
async fn ollama_alias_reads_local_settings() {
    let env = EnvDirGuard::new();
    env.write_provider_json(
        r#"{
  "provider": "ollama",
  "local": { "model": "llama3.2", "base_url": "http://127.0.0.1:9" }
}"#,
    );

    let provider = create_provider_with_overrides(ProviderOverrides::default())
        .await
        .unwrap();

    assert_eq!(provider.name(), "local");
    assert_eq!(provider.model().as_str(), "llama3.2");
}

#[tokio::test]
async fn explicit_provider_without_key_is_an_error() {
    let env = EnvDirGuard::new();
    env.set("PROVIDER", "openai");

    let err = create_provider_with_overrides(ProviderOverrides::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, GatewayError::MissingApiKey(ref p) if p == "openai"));
}

#[tokio::test]
async fn unknown_provider_is_a_config_error() {
    let _env = EnvDirGuard::new();

    let err = create_provider_with_overrides(ProviderOverrides {
        model: None,
        provider: Some("mystery".to_string()),
    })
    .await
    .err()
    .unwrap();
    assert!(matches!(err, GatewayError::Config(_)));
}

#[tokio::test]
async fn nothing_configured_is_reported() {
    let _env = EnvDirGuard::new();

    let err = create_provider_with_overrides(ProviderOverrides::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, GatewayError::NoProviderConfigured));
}
