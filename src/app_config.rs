use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::pipeline::generator::ImageSize;

pub const APP_CONFIG_PATH: &str = ".pencil/config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load from `.pencil/config.json`; a missing file yields defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new(APP_CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on each gateway call; expiry fails the stage.
    pub stage_timeout_secs: u64,
    pub image_width: u32,
    pub image_height: u32,
    /// Write stage events to `<log_dir>/events.jsonl`.
    pub event_log: bool,
    pub log_dir: String,
    /// Append one record per run to the observability trace.
    pub trace: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: 30,
            image_width: 1024,
            image_height: 1024,
            event_log: false,
            log_dir: ".pencil/pipeline_logs/".to_string(),
            trace: true,
        }
    }
}

impl PipelineConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs.max(1))
    }

    pub fn image_size(&self) -> ImageSize {
        ImageSize {
            width: self.image_width,
            height: self.image_height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub conversations_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            conversations_dir: ".pencil/conversations".to_string(),
        }
    }
}
