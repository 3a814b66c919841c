//! One summary record per Super Mode run under `<root>/traces/runs.jsonl`.

use serde_json::{Value, json};
use std::io;
use std::path::{Path, PathBuf};

use crate::errors::PipelineError;
use crate::observability::{append_jsonl, observability_root};
use crate::pipeline::PipelineResult;
use crate::sanitize::redact_secrets;

pub fn run_trace_path(root: &Path) -> PathBuf {
    root.join("traces").join("runs.jsonl")
}

pub fn append_run_trace(
    prompt: &str,
    outcome: &Result<PipelineResult, PipelineError>,
) -> io::Result<()> {
    append_run_trace_in_dir(&observability_root(), prompt, outcome)
}

pub fn append_run_trace_in_dir(
    root: &Path,
    prompt: &str,
    outcome: &Result<PipelineResult, PipelineError>,
) -> io::Result<()> {
    append_jsonl(&run_trace_path(root), &run_record(prompt, outcome))
}

fn run_record(prompt: &str, outcome: &Result<PipelineResult, PipelineError>) -> Value {
    match outcome {
        Ok(result) => json!({
            "status": "completed",
            "run_id": result.run_id,
            "prompt_chars": prompt.chars().count(),
            "response_type": result.response_type,
            "overall_confidence": result.overall_confidence,
            "total_tokens": result.total_tokens(),
            "primary_tokens": result.primary_tokens,
            "steps": result.steps,
            "usage": result.usage,
        }),
        Err(err) => {
            let status = match err {
                PipelineError::Cancelled { .. } => "cancelled",
                _ => "failed",
            };
            json!({
                "status": status,
                "prompt_chars": prompt.chars().count(),
                "error_code": err.code(),
                "error": redact_secrets(&err.to_string()),
                "stage": err.stage(),
                "steps": err.partial_steps(),
                "usage": err.partial_usage(),
            })
        }
    }
}
