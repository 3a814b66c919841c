use colored::*;

use crate::errors::PipelineError;
use crate::modes::ModeResult;
use crate::pipeline::{PipelineResult, ProcessingStep, StepStatus};
use crate::sanitize;

pub fn init_logging() {
    // Internal logs are opt-in via RUST_LOG; rendered output stays on stdout.
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(log::LevelFilter::Warn);
    }
    let _ = builder.try_init();
}

pub fn header(provider: &str, chat_model: &str) {
    println!(
        "{} {} | {}",
        ">>".bold(),
        "pencil".bold(),
        format!("{provider}/{chat_model}").cyan(),
    );
}

pub fn info(msg: impl AsRef<str>) {
    println!("{}", sanitize::sanitize_preview_for_console(msg.as_ref()));
}

pub fn warn(msg: impl AsRef<str>) {
    eprintln!("{}", sanitize::sanitize_preview_for_console(msg.as_ref()).yellow());
}

pub fn error(msg: impl AsRef<str>) {
    eprintln!("{}", sanitize::sanitize_preview_for_console(msg.as_ref()).red());
}

pub fn step_line(step: &ProcessingStep) -> String {
    let marker = match step.status {
        StepStatus::Completed => "✓".green(),
        StepStatus::Processing => "…".yellow(),
        StepStatus::Failed => "✗".red(),
        StepStatus::Cancelled => "-".dimmed(),
    };
    format!(
        "  {marker} {}. {} {} {}",
        step.ordinal,
        step.description,
        format!("[{}]", step.model_name).dimmed(),
        format!("{}ms", step.duration_ms).dimmed()
    )
}

pub fn steps(steps: &[ProcessingStep]) {
    for step in steps {
        println!("{}", step_line(step));
    }
}

pub fn pipeline_result(result: &PipelineResult, quiet: bool) {
    if !quiet {
        println!("\n{}", "Super Mode".bold());
        steps(&result.steps);
    }

    println!(
        "\n{} {}",
        "●".blue().bold(),
        sanitize::sanitize_for_console(&result.content)
    );
    if let Some(caption) = &result.caption {
        println!("  {}", sanitize::sanitize_preview_for_console(caption).dimmed());
    }

    if !quiet {
        println!(
            "\n{}",
            format!(
                "{} | confidence {:.0}% | {} tokens",
                result.response_type,
                result.overall_confidence * 100.0,
                result.total_tokens()
            )
            .dimmed()
        );
    }
}

pub fn mode_result(result: &ModeResult, quiet: bool) {
    println!(
        "\n{} {}",
        "●".blue().bold(),
        sanitize::sanitize_for_console(&result.content)
    );
    if !quiet {
        println!(
            "{}",
            format!("{} | {} | {} tokens", result.mode, result.model, result.tokens_consumed)
                .dimmed()
        );
    }
}

/// Shows the generic message plus whatever steps finished before the failure.
pub fn pipeline_error(err: &PipelineError) {
    let partial = err.partial_steps();
    if !partial.is_empty() {
        steps(partial);
    }
    error(err.user_message());
}

pub fn goodbye() {
    println!("\n{}", "Goodbye!".dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;

    #[test]
    fn step_line_includes_ordinal_and_model() {
        colored::control::set_override(false);
        let line = step_line(&ProcessingStep {
            ordinal: 3,
            stage: Stage::GeneratingAlternative,
            description: "Generating alternative perspective".to_string(),
            model_name: "gpt-5-mini".to_string(),
            duration_ms: 120,
            status: StepStatus::Failed,
        });
        assert_eq!(
            line,
            "  ✗ 3. Generating alternative perspective [gpt-5-mini] 120ms"
        );
    }
}
