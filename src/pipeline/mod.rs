//! Super Mode: analyze, generate, generate an alternative, synthesize.
//!
//! Stages run strictly in sequence because each consumes the previous
//! stage's output. Image requests stop after primary generation.

pub mod alternative;
pub mod analyzer;
pub mod generator;
pub mod logging;
pub mod steps;
pub mod synthesizer;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::app_config::PipelineConfig;
use crate::errors::{GatewayError, PipelineError, PipelineStageError};
use crate::events::{Event, EventContext, EventManager};
use crate::gateway::{Capability, ModelGateway};
use crate::prompts;
use crate::types::ResponseType;

pub use analyzer::{AnalysisOutcome, analyze};
pub use logging::PipelineLogger;
pub use steps::StepLog;
pub use types::{
    ConfidenceSource, GenerationResult, ModelUsageRecord, PipelineResult, ProcessingStep,
    PromptAnalysis, Stage, StepStatus,
};

/// Per-invocation state. Never shared between runs.
struct RunState<'a> {
    run_id: String,
    started: Instant,
    log: StepLog,
    cancel: &'a CancellationToken,
}

pub struct SuperMode {
    gateway: Arc<dyn ModelGateway>,
    config: PipelineConfig,
    events: EventManager,
    logger: Option<PipelineLogger>,
}

impl SuperMode {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            config: PipelineConfig::default(),
            events: EventManager::new(),
            logger: None,
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_events(mut self, events: EventManager) -> Self {
        self.events = events;
        self
    }

    pub fn with_logger(mut self, logger: PipelineLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn events_mut(&mut self) -> &mut EventManager {
        &mut self.events
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, prompt: &str) -> Result<PipelineResult, PipelineError> {
        self.run_with_cancel(prompt, &CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        if prompt.trim().is_empty() {
            return Err(PipelineError::EmptyPrompt);
        }

        let mut run = RunState {
            run_id: uuid::Uuid::new_v4().to_string(),
            started: Instant::now(),
            log: StepLog::new(),
            cancel,
        };
        log::debug!("super mode run {} started ({} chars)", run.run_id, prompt.len());
        self.emit(
            Event::RunStarted,
            EventContext::new(run.run_id.clone())
                .with_metadata("prompt_chars", prompt.len().to_string()),
        );

        let gateway = self.gateway.as_ref();

        let outcome = self
            .stage(
                &mut run,
                Stage::Analyzing,
                None,
                Capability::Chat,
                analyze(gateway, prompt),
            )
            .await?;
        if !outcome.parsed {
            self.emit(
                Event::AnalysisFallback,
                EventContext::new(run.run_id.clone()).with_stage(Stage::Analyzing),
            );
        }
        run.log.record_usage(outcome.usage);
        let analysis = outcome.analysis;
        log::info!(
            "run {} classified as {} ({}, confidence {:.2})",
            run.run_id,
            analysis.response_type,
            analysis.complexity,
            analysis.confidence
        );

        let kind = analysis.response_type;
        let primary_capability = match kind {
            ResponseType::Code => Capability::Code,
            ResponseType::Image => Capability::Image,
            ResponseType::Text => Capability::Chat,
        };
        let primary = self
            .stage(
                &mut run,
                Stage::GeneratingPrimary,
                Some(kind),
                primary_capability,
                generator::generate_primary(gateway, &analysis, self.config.image_size()),
            )
            .await?;

        let result = match kind {
            ResponseType::Image => self.finish_image(run, prompt, analysis, primary),
            ResponseType::Code | ResponseType::Text => {
                let (alternative, alt_usage) = self
                    .stage(
                        &mut run,
                        Stage::GeneratingAlternative,
                        Some(kind),
                        Capability::Chat,
                        alternative::generate_alternative(gateway, &analysis, &primary),
                    )
                    .await?;
                run.log.record_usage(alt_usage);

                let (synthesis, synth_usage) = self
                    .stage(
                        &mut run,
                        Stage::Synthesizing,
                        Some(kind),
                        Capability::Chat,
                        synthesizer::synthesize(
                            gateway,
                            prompt,
                            &analysis,
                            &primary,
                            Some(&alternative),
                        ),
                    )
                    .await?;
                run.log.record_usage(synth_usage);

                self.assemble(
                    run,
                    analysis,
                    synthesis.content,
                    primary.tokens_consumed,
                    Some(vec![alternative.content]),
                    None,
                    None,
                )
            }
        };

        log::info!(
            "run {} done: {} steps, confidence {:.2}",
            result.run_id,
            result.steps.len(),
            result.overall_confidence
        );
        self.emit(
            Event::RunCompleted,
            EventContext::new(result.run_id.clone())
                .with_metadata("steps", result.steps.len().to_string())
                .with_metadata("overall_confidence", format!("{:.4}", result.overall_confidence)),
        );
        Ok(result)
    }

    fn finish_image(
        &self,
        run: RunState<'_>,
        prompt: &str,
        analysis: PromptAnalysis,
        primary: GenerationResult,
    ) -> PipelineResult {
        let caption = prompts::image_caption(prompt);
        let tokens = primary.tokens_consumed;
        let image = primary.image;
        self.assemble(
            run,
            analysis,
            primary.content,
            tokens,
            None,
            Some(caption),
            image,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        run: RunState<'_>,
        analysis: PromptAnalysis,
        content: String,
        primary_tokens: u32,
        alternatives: Option<Vec<String>>,
        caption: Option<String>,
        image: Option<crate::gateway::GeneratedImage>,
    ) -> PipelineResult {
        // Analysis always records usage on success, so the mean is defined here.
        let overall_confidence = run.log.overall_confidence().unwrap_or(0.0);
        let (steps, usage) = run.log.into_parts();
        PipelineResult {
            run_id: run.run_id,
            response_type: analysis.response_type,
            content,
            reasoning: analysis.reasoning,
            steps,
            usage,
            overall_confidence,
            primary_tokens,
            alternatives,
            caption,
            image,
        }
    }

    /// Runs one stage with step bookkeeping, the stage timeout and cancellation.
    async fn stage<T, F>(
        &self,
        run: &mut RunState<'_>,
        stage: Stage,
        kind: Option<ResponseType>,
        capability: Capability,
        work: F,
    ) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        let handle = run.log.begin(
            stage,
            stage.description(kind),
            self.gateway.model_name(capability),
        );
        log::debug!("run {} entering {stage}", run.run_id);
        self.emit_step(Event::StageStarted, run, handle);

        let stage_started = Instant::now();
        let timeout = self.config.stage_timeout();
        let outcome = tokio::select! {
            biased;
            _ = run.cancel.cancelled() => None,
            res = tokio::time::timeout(timeout, work) => {
                Some(res.unwrap_or(Err(GatewayError::Timeout(timeout))))
            }
        };

        match outcome {
            Some(Ok(value)) => {
                run.log.complete(handle, stage_started.elapsed());
                self.emit_step(Event::StageCompleted, run, handle);
                Ok(value)
            }
            Some(Err(source)) => {
                run.log.fail_in_flight(run.started.elapsed());
                log::error!("run {} failed in {stage}: {source}", run.run_id);
                self.emit(
                    Event::StageFailed,
                    self.step_context(run, handle).with_error(source.code().to_string()),
                );
                let (steps, usage) = std::mem::take(&mut run.log).into_parts();
                Err(PipelineError::Stage(PipelineStageError {
                    stage,
                    source,
                    steps,
                    usage,
                }))
            }
            None => {
                run.log.cancel_in_flight(run.started.elapsed());
                log::info!("run {} cancelled in {stage}", run.run_id);
                self.emit(Event::RunCancelled, self.step_context(run, handle));
                let (steps, usage) = std::mem::take(&mut run.log).into_parts();
                Err(PipelineError::Cancelled {
                    stage,
                    steps,
                    usage,
                })
            }
        }
    }

    fn step_context(&self, run: &RunState<'_>, handle: steps::StepHandle) -> EventContext {
        let ctx = EventContext::new(run.run_id.clone());
        match run.log.step(handle) {
            Some(step) => ctx.with_step(step.clone()),
            None => ctx,
        }
    }

    fn emit_step(&self, event: Event, run: &RunState<'_>, handle: steps::StepHandle) {
        self.emit(event, self.step_context(run, handle));
    }

    fn emit(&self, event: Event, ctx: EventContext) {
        if let Some(logger) = &self.logger {
            let written = match &ctx.step {
                Some(step) => logger.log_step(&ctx.run_id, step),
                None => logger.log_event(
                    &ctx.run_id,
                    event.name(),
                    serde_json::json!({
                        "stage": ctx.stage,
                        "error": ctx.error,
                        "metadata": ctx.metadata,
                    }),
                ),
            };
            if let Err(e) = written {
                log::warn!("failed to write pipeline event {}: {e}", event.name());
            }
        }
        self.events.fire(event, &ctx);
    }
}

/// Runs Super Mode with default configuration.
pub async fn run_super_mode(
    gateway: Arc<dyn ModelGateway>,
    prompt: &str,
) -> Result<PipelineResult, PipelineError> {
    SuperMode::new(gateway).run(prompt).await
}
