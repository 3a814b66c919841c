use std::time::Duration;

use thiserror::Error;

use crate::pipeline::types::{ModelUsageRecord, ProcessingStep, Stage};

/// Generic text shown to end users when a run fails. Provider detail is logged, not echoed.
pub const USER_FACING_FAILURE: &str = "Processing failed. Please try again.";

/// Errors raised by the model gateway and its backends.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("No API key configured for {0}")]
    MissingApiKey(String),

    #[error("No provider configured: set ANTHROPIC_API_KEY, OPENAI_API_KEY, or run Ollama")]
    NoProviderConfigured,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{provider} API error {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} rate limited")]
    RateLimited {
        provider: &'static str,
        retry_after: Option<Duration>,
    },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Gateway call timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("All image providers failed: {}", attempts.join("; "))]
    ProvidersExhausted { attempts: Vec<String> },
}

impl GatewayError {
    /// Short code for logs and traces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingApiKey(_) => "missing_api_key",
            Self::NoProviderConfigured => "no_provider",
            Self::Config(_) => "config_error",
            Self::Api { .. } => "api_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Timeout(_) => "timeout",
            Self::Http(_) => "http_error",
            Self::ProvidersExhausted { .. } => "providers_exhausted",
        }
    }

    /// Whether a retrying collaborator could reasonably try again. The pipeline itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// The analyzer's structured output could not be decoded. Recovered inside the analyzer.
#[derive(Error, Debug)]
pub enum AnalysisFormatError {
    #[error("no JSON object in analysis payload")]
    NoJsonObject,

    #[error("malformed analysis JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown response type '{0}'")]
    UnknownResponseType(String),
}

/// A stage of the pipeline failed. Carries the partial history for diagnostics.
#[derive(Error, Debug)]
#[error("stage {stage} failed: {source}")]
pub struct PipelineStageError {
    pub stage: Stage,
    #[source]
    pub source: GatewayError,
    pub steps: Vec<ProcessingStep>,
    pub usage: Vec<ModelUsageRecord>,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error(transparent)]
    Stage(#[from] PipelineStageError),

    #[error("pipeline cancelled during {stage}")]
    Cancelled {
        stage: Stage,
        steps: Vec<ProcessingStep>,
        usage: Vec<ModelUsageRecord>,
    },
}

impl PipelineError {
    /// Name of the stage that ended the run, if a stage was running.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::EmptyPrompt => None,
            Self::Stage(err) => Some(err.stage),
            Self::Cancelled { stage, .. } => Some(*stage),
        }
    }

    /// Steps recorded before the run ended.
    pub fn partial_steps(&self) -> &[ProcessingStep] {
        match self {
            Self::EmptyPrompt => &[],
            Self::Stage(err) => &err.steps,
            Self::Cancelled { steps, .. } => steps,
        }
    }

    pub fn partial_usage(&self) -> &[ModelUsageRecord] {
        match self {
            Self::EmptyPrompt => &[],
            Self::Stage(err) => &err.usage,
            Self::Cancelled { usage, .. } => usage,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyPrompt => "empty_prompt",
            Self::Stage(err) => err.source.code(),
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Message safe to show an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyPrompt => "Please enter a prompt.",
            Self::Cancelled { .. } => "Request cancelled.",
            Self::Stage(_) => USER_FACING_FAILURE,
        }
    }
}
