pub mod api;
pub mod app_config;
pub mod config_file;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod modes;
pub mod observability;
pub mod pipeline;
pub mod prompts;
pub mod sanitize;
pub mod store;
pub mod trace;
pub mod types;
pub mod ui;

pub use crate::api::{ChatMessage, ChatRole};
pub use crate::app_config::{AppConfig, PipelineConfig};
pub use crate::config_file::ProviderConfig;
pub use crate::errors::{GatewayError, PipelineError, PipelineStageError};
pub use crate::events::{Event, EventContext, EventManager};
pub use crate::gateway::{
    Capability, Completion, GeneratedImage, LLMProvider, ModelGateway, ProviderGateway,
    ProviderOverrides, create_gateway, create_provider, create_provider_with_overrides,
};
pub use crate::modes::{Mode, ModeResult};
pub use crate::pipeline::{
    PipelineResult, ProcessingStep, PromptAnalysis, Stage, StepStatus, SuperMode, run_super_mode,
};
pub use crate::store::{ConversationStore, JsonlConversationStore, StoredMessage};
pub use crate::types::{Complexity, ModelId, ResponseType};
