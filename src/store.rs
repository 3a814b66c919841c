//! Conversation persistence. Callers write only after a successful run.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::api::{ChatMessage, ChatRole};
use crate::pipeline::PipelineResult;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid conversation id '{0}'")]
    InvalidId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub conversation_id: String,
    pub role: ChatRole,
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn new(conversation_id: impl Into<String>, role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            metadata: Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn as_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends all of `messages` or none of them.
    async fn append_all(&self, messages: &[StoredMessage]) -> Result<(), StoreError>;

    async fn append(&self, message: StoredMessage) -> Result<(), StoreError> {
        self.append_all(std::slice::from_ref(&message)).await
    }

    /// Messages of one conversation in insertion order; empty when unknown.
    async fn messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>, StoreError>;
}

pub fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Writes the user prompt and the assistant answer of a successful run.
pub async fn persist_exchange(
    store: &dyn ConversationStore,
    conversation_id: &str,
    prompt: &str,
    result: &PipelineResult,
) -> Result<(), StoreError> {
    let metadata = json!({
        "mode": "super",
        "runId": result.run_id,
        "responseType": result.response_type,
        "overallConfidence": result.overall_confidence,
        "steps": result.steps.len(),
        "totalTokens": result.total_tokens(),
        "image": result.image,
    });
    store
        .append_all(&[
            StoredMessage::new(conversation_id, ChatRole::User, prompt),
            StoredMessage::new(conversation_id, ChatRole::Assistant, result.content.clone())
                .with_metadata(metadata),
        ])
        .await
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<String, Vec<StoredMessage>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append_all(&self, messages: &[StoredMessage]) -> Result<(), StoreError> {
        let mut conversations = self.conversations.lock().await;
        for message in messages {
            conversations
                .entry(message.conversation_id.clone())
                .or_default()
                .push(message.clone());
        }
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>, StoreError> {
        Ok(self
            .conversations
            .lock()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// One JSONL file per conversation under `dir`.
pub struct JsonlConversationStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlConversationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, conversation_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !conversation_id.is_empty()
            && conversation_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidId(conversation_id.to_string()));
        }
        Ok(self.dir.join(format!("{conversation_id}.jsonl")))
    }
}

#[async_trait::async_trait]
impl ConversationStore for JsonlConversationStore {
    async fn append_all(&self, messages: &[StoredMessage]) -> Result<(), StoreError> {
        // Serialize every row up front so a bad record writes nothing.
        let mut batches: Vec<(PathBuf, String)> = Vec::new();
        for message in messages {
            let path = self.path_for(&message.conversation_id)?;
            let line = serde_json::to_string(message)?;
            match batches.iter_mut().find(|(p, _)| *p == path) {
                Some((_, buf)) => {
                    buf.push_str(&line);
                    buf.push('\n');
                }
                None => batches.push((path, format!("{line}\n"))),
            }
        }

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.dir)?;
        for (path, buf) in batches {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(buf.as_bytes())?;
        }
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>, StoreError> {
        let path = self.path_for(conversation_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(path)?;
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line)?);
        }
        Ok(out)
    }
}
