use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use serde_json::{Map, Value, json};

use super::types::ProcessingStep;

/// Appends Super Mode stage events to `<log_dir>/events.jsonl`.
pub struct PipelineLogger {
    file: Mutex<File>,
}

impl PipelineLogger {
    pub fn new(log_dir: PathBuf) -> io::Result<Self> {
        create_dir_all(&log_dir)?;
        let path = log_dir.join("events.jsonl");
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Note: `flush` only pushes to OS buffers; it does not guarantee durability on disk.
    pub fn log_event(&self, run_id: &str, event: &str, data: Value) -> io::Result<()> {
        let mut record = Map::new();
        record.insert("ts".to_string(), json!(chrono::Utc::now().timestamp_millis()));
        record.insert("run_id".to_string(), json!(run_id));
        record.insert("event".to_string(), json!(event));
        record.insert("data".to_string(), data);

        let line = serde_json::to_string(&record).map_err(io::Error::other)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("logger mutex poisoned"))?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }

    pub fn log_step(&self, run_id: &str, step: &ProcessingStep) -> io::Result<()> {
        let data = serde_json::to_value(step).map_err(io::Error::other)?;
        self.log_event(run_id, "step", data)
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineLogger;
    use crate::pipeline::types::{ProcessingStep, Stage, StepStatus};

    #[test]
    fn test_jsonl_events_written_with_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let logger = PipelineLogger::new(dir.path().to_path_buf()).unwrap();
        logger
            .log_event("run-1", "started", serde_json::json!({"prompt_chars": 5}))
            .unwrap();
        logger
            .log_step(
                "run-1",
                &ProcessingStep {
                    ordinal: 1,
                    stage: Stage::Analyzing,
                    description: "analyze".to_string(),
                    model_name: "m".to_string(),
                    duration_ms: 4,
                    status: StepStatus::Completed,
                },
            )
            .unwrap();

        let entries = std::fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = entries
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "started");
        assert_eq!(lines[1]["run_id"], "run-1");
        assert_eq!(lines[1]["data"]["stage"], "ANALYZING");
    }
}
