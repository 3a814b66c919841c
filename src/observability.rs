use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const OBSERVABILITY_DIR_ENV: &str = "PENCIL_OBSERVABILITY_DIR";

/// Root for run traces; `PENCIL_OBSERVABILITY_DIR` overrides `.pencil/observability`.
pub fn observability_root() -> PathBuf {
    std::env::var(OBSERVABILITY_DIR_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".pencil/observability"))
}

/// Appends `{"ts": <unix millis>, "event": value}` as one line.
pub fn append_jsonl(path: &Path, value: &Value) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut record = Map::new();
    record.insert(
        "ts".to_string(),
        Value::from(chrono::Utc::now().timestamp_millis()),
    );
    record.insert("event".to_string(), value.clone());
    let line = serde_json::to_string(&Value::Object(record)).map_err(io::Error::other)?;

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}
