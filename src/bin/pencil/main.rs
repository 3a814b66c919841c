use anyhow::Result;
use colored::*;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use pencil_ai::api::{ChatMessage, ChatRole};
use pencil_ai::gateway::ProviderGateway;
use pencil_ai::pipeline::PipelineLogger;
use pencil_ai::sanitize::redact_secrets;
use pencil_ai::store::{ConversationStore, JsonlConversationStore, StoredMessage, persist_exchange};
use pencil_ai::{
    AppConfig, Capability, Mode, ModelGateway, ModelId, ProviderOverrides, SuperMode, create_gateway,
    modes, trace, ui,
};

mod args;
mod cli;
use args::CliArgs;
use cli::{CliCommand, parse_input};

struct Session {
    gateway: Arc<dyn ModelGateway>,
    super_mode: SuperMode,
    config: AppConfig,
    store: JsonlConversationStore,
    conversation_id: String,
    mode: Mode,
    quiet: bool,
    json_output: bool,
}

impl Session {
    /// Runs one prompt in the current mode. Returns false when the run failed.
    async fn handle(&self, prompt: &str) -> bool {
        match self.mode {
            Mode::Super => self.handle_super(prompt).await,
            mode => self.handle_single(mode, prompt).await,
        }
    }

    async fn handle_super(&self, prompt: &str) -> bool {
        let cancel = CancellationToken::new();
        let watcher = spawn_ctrl_c_watcher(cancel.clone());
        let outcome = self.super_mode.run_with_cancel(prompt, &cancel).await;
        watcher.abort();

        if self.config.pipeline.trace
            && let Err(e) = trace::append_run_trace(prompt, &outcome)
        {
            log::warn!("failed to append run trace: {e}");
        }

        match outcome {
            Ok(result) => {
                if let Err(e) =
                    persist_exchange(&self.store, &self.conversation_id, prompt, &result).await
                {
                    log::warn!("failed to persist conversation {}: {e}", self.conversation_id);
                }
                if self.json_output {
                    print_json(&result);
                } else {
                    ui::pipeline_result(&result, self.quiet);
                }
                true
            }
            Err(err) => {
                log::error!("super mode failed: {}", redact_secrets(&err.to_string()));
                if self.json_output {
                    print_json(&serde_json::json!({
                        "error": err.user_message(),
                        "code": err.code(),
                        "stage": err.stage(),
                        "steps": err.partial_steps(),
                    }));
                } else {
                    ui::pipeline_error(&err);
                }
                false
            }
        }
    }

    async fn handle_single(&self, mode: Mode, prompt: &str) -> bool {
        let gateway = self.gateway.as_ref();
        let work = async {
            match mode {
                Mode::Chat => {
                    let history: Vec<ChatMessage> = match self.store.messages(&self.conversation_id).await {
                        Ok(messages) => messages.iter().map(StoredMessage::as_chat_message).collect(),
                        Err(e) => {
                            log::warn!("could not load conversation history: {e}");
                            Vec::new()
                        }
                    };
                    modes::chat(gateway, &history, prompt).await
                }
                Mode::Code => modes::code(gateway, prompt).await,
                _ => modes::image(gateway, prompt, self.config.pipeline.image_size()).await,
            }
        };

        let cancel = CancellationToken::new();
        let watcher = spawn_ctrl_c_watcher(cancel.clone());
        let outcome = modes::run_cancellable(&cancel, work).await;
        watcher.abort();

        match outcome {
            None => {
                log::info!("{mode} request cancelled");
                if self.json_output {
                    print_json(&serde_json::json!({
                        "error": "Request cancelled.",
                        "code": "cancelled",
                    }));
                } else {
                    ui::warn("Request cancelled.");
                }
                false
            }
            Some(Ok(result)) => {
                let metadata = serde_json::json!({
                    "mode": result.mode,
                    "model": result.model,
                    "tokensConsumed": result.tokens_consumed,
                });
                let exchange = [
                    StoredMessage::new(&self.conversation_id, ChatRole::User, prompt),
                    StoredMessage::new(&self.conversation_id, ChatRole::Assistant, &result.content)
                        .with_metadata(metadata),
                ];
                if let Err(e) = self.store.append_all(&exchange).await {
                    log::warn!("failed to persist conversation {}: {e}", self.conversation_id);
                }
                if self.json_output {
                    print_json(&result);
                } else {
                    ui::mode_result(&result, self.quiet);
                }
                true
            }
            Some(Err(err)) => {
                log::error!("{mode} request failed: {}", redact_secrets(&err.to_string()));
                if self.json_output {
                    print_json(&serde_json::json!({
                        "error": pencil_ai::errors::USER_FACING_FAILURE,
                        "code": err.code(),
                    }));
                } else {
                    ui::error(pencil_ai::errors::USER_FACING_FAILURE);
                }
                false
            }
        }
    }
}

fn spawn_ctrl_c_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    })
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => ui::error(format!("failed to encode output: {e}")),
    }
}

fn build_super_mode(gateway: Arc<dyn ModelGateway>, config: &AppConfig) -> SuperMode {
    let mut super_mode = SuperMode::new(gateway).with_config(config.pipeline.clone());
    if config.pipeline.event_log {
        match PipelineLogger::new(config.pipeline.log_dir.clone().into()) {
            Ok(logger) => super_mode = super_mode.with_logger(logger),
            Err(e) => log::warn!("pipeline event log disabled: {e}"),
        }
    }
    super_mode
}

#[tokio::main]
async fn main() -> Result<()> {
    ui::init_logging();

    let cli_args = CliArgs::parse()?;
    let config = AppConfig::load()?;

    let overrides = ProviderOverrides {
        model: cli_args.model.clone().map(ModelId::new),
        provider: cli_args.provider.clone(),
    };
    let gateway: ProviderGateway = match create_gateway(overrides).await {
        Ok(gateway) => gateway,
        Err(e) => {
            ui::error(format!("Could not start: {e}"));
            std::process::exit(2);
        }
    };
    let provider_name = gateway.provider_name().to_string();
    let gateway: Arc<dyn ModelGateway> = Arc::new(gateway);

    let session = Session {
        super_mode: build_super_mode(gateway.clone(), &config),
        store: JsonlConversationStore::new(&config.store.conversations_dir),
        conversation_id: cli_args
            .conversation
            .clone()
            .unwrap_or_else(pencil_ai::store::new_conversation_id),
        gateway,
        config,
        mode: cli_args.mode,
        quiet: cli_args.quiet,
        json_output: cli_args.json_output,
    };

    if cli_args.is_scriptable() {
        let prompt = cli_args.get_prompt()?.unwrap_or_default();
        if !session.handle(&prompt).await {
            std::process::exit(1);
        }
        return Ok(());
    }

    run_repl(session, &provider_name).await
}

async fn run_repl(mut session: Session, provider_name: &str) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    ui::header(provider_name, &session.gateway.model_name(Capability::Chat));
    println!(
        "{}",
        format!(
            "Mode: {} | Commands: /mode <super|chat|code|image>, /c (new conversation), /q (quit)",
            session.mode
        )
        .dimmed()
    );

    loop {
        let prompt = format!("{} {} ", session.mode.as_str().dimmed(), "❯".purple().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                let Some(command) = parse_input(&line) else {
                    continue;
                };
                let _ = rl.add_history_entry(&line);

                match command {
                    CliCommand::Quit => break,
                    CliCommand::Clear => {
                        session.conversation_id = pencil_ai::store::new_conversation_id();
                        println!("{}", "● Started a new conversation".dimmed());
                    }
                    CliCommand::SwitchMode(mode) => {
                        session.mode = mode;
                        println!("{}", format!("● Mode: {mode}").dimmed());
                    }
                    CliCommand::Help => {
                        println!(
                            "{}",
                            "/mode <super|chat|code|image>  /c new conversation  /q quit".dimmed()
                        );
                    }
                    CliCommand::Message(msg) => {
                        session.handle(&msg).await;
                    }
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                ui::error(format!("Input error: {e:?}"));
                break;
            }
        }
    }

    ui::goodbye();
    Ok(())
}
