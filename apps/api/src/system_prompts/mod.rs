// System prompt management.
// Implements: file-backed prompt storage with name/content validation, the manager
// (TTL caches, active prompt, protected default) and its HTTP handlers.

use thiserror::Error;

pub mod handlers;
pub mod manager;
pub mod prompts;
pub mod store;

pub use manager::{ActivePrompt, PromptInfo, SystemPromptManager};
pub use store::PromptStore;

/// Name of the prompt that always exists and cannot be deleted.
pub const DEFAULT_PROMPT_NAME: &str = "default";

#[derive(Debug, Error)]
pub enum PromptStoreError {
    #[error("system prompt not found: {0}")]
    NotFound(String),

    #[error("invalid system prompt: {0}")]
    Validation(String),

    #[error("system prompt already exists: {0}")]
    AlreadyExists(String),

    #[error("the default system prompt cannot be deleted")]
    Protected,

    #[error("system prompt storage error: {0}")]
    Storage(String),

    #[error("failed to create history folder: {0}")]
    HistoryFolder(String),
}
