use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use moka::sync::Cache;
use serde::Serialize;
use tracing::{info, warn};

use crate::system_prompts::prompts::DEFAULT_PROMPT_CONTENT;
use crate::system_prompts::store::PromptStore;
use crate::system_prompts::{PromptStoreError, DEFAULT_PROMPT_NAME};

const CACHE_TTL: Duration = Duration::from_secs(300);
const CONTENT_CACHE_CAPACITY: u64 = 256;

#[derive(Debug, Clone, Serialize)]
pub struct PromptInfo {
    pub name: String,
    pub is_active: bool,
    pub history_folder: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivePrompt {
    pub name: String,
    pub content: String,
    pub history_folder: PathBuf,
}

struct ActiveState {
    name: String,
    /// History folder used by summaries. Starts at the history root and follows
    /// the active prompt once one is activated.
    history_folder: PathBuf,
}

/// Coordinates prompt CRUD on top of `PromptStore` and tracks the active prompt.
pub struct SystemPromptManager {
    store: PromptStore,
    contents: Cache<String, String>,
    listing: Cache<(), Vec<PromptInfo>>,
    active: Mutex<ActiveState>,
}

impl SystemPromptManager {
    /// Ensures the default prompt exists and selects `active_prompt`, falling back
    /// to the default when it is missing. Cached reads live for five minutes.
    pub fn new(store: PromptStore, active_prompt: &str) -> Result<Self, PromptStoreError> {
        Self::with_cache_ttl(store, active_prompt, CACHE_TTL)
    }

    pub fn with_cache_ttl(
        store: PromptStore,
        active_prompt: &str,
        ttl: Duration,
    ) -> Result<Self, PromptStoreError> {
        if !store.exists(DEFAULT_PROMPT_NAME)? {
            store.save(DEFAULT_PROMPT_NAME, DEFAULT_PROMPT_CONTENT)?;
            info!("Created default system prompt");
        }

        let name = if store.exists(active_prompt)? {
            active_prompt.to_string()
        } else {
            warn!("Configured active prompt '{active_prompt}' not found, using default");
            DEFAULT_PROMPT_NAME.to_string()
        };

        let history_folder = store.history_root().to_path_buf();
        Ok(Self {
            store,
            contents: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(CONTENT_CACHE_CAPACITY)
                .build(),
            listing: Cache::builder().time_to_live(ttl).max_capacity(1).build(),
            active: Mutex::new(ActiveState {
                name,
                history_folder,
            }),
        })
    }

    fn active_state(&self) -> MutexGuard<'_, ActiveState> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Creates a new prompt. Existing prompts are never overwritten.
    pub fn create(&self, name: &str, content: &str) -> Result<(), PromptStoreError> {
        if self.store.exists(name)? {
            return Err(PromptStoreError::AlreadyExists(name.to_string()));
        }
        self.store.save(name, content)?;
        self.listing.invalidate_all();
        info!("Created system prompt '{name}'");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<String, PromptStoreError> {
        if let Some(content) = self.contents.get(name) {
            return Ok(content);
        }

        let content = self.store.load(name)?;
        self.contents.insert(name.to_string(), content.clone());
        Ok(content)
    }

    pub fn update(&self, name: &str, content: &str) -> Result<(), PromptStoreError> {
        if !self.store.exists(name)? {
            return Err(PromptStoreError::NotFound(name.to_string()));
        }
        self.store.save(name, content)?;
        self.contents.invalidate(name);
        info!("Updated system prompt '{name}'");
        Ok(())
    }

    /// Deletes a prompt. Deleting the active prompt re-activates the default.
    pub fn delete(&self, name: &str) -> Result<(), PromptStoreError> {
        if name == DEFAULT_PROMPT_NAME {
            return Err(PromptStoreError::Protected);
        }
        if self.active_name() == name {
            self.set_active(DEFAULT_PROMPT_NAME)?;
        }
        if !self.store.delete(name)? {
            return Err(PromptStoreError::NotFound(name.to_string()));
        }

        self.contents.invalidate(name);
        self.listing.invalidate_all();
        info!("Deleted system prompt '{name}'");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<PromptInfo>, PromptStoreError> {
        if let Some(listing) = self.listing.get(&()) {
            return Ok(listing);
        }

        let active = self.active_name();
        let listing: Vec<PromptInfo> = self
            .store
            .list()?
            .into_iter()
            .map(|name| PromptInfo {
                is_active: name == active,
                history_folder: self.store.history_folder(&name),
                name,
            })
            .collect();
        self.listing.insert((), listing.clone());
        Ok(listing)
    }

    pub fn set_active(&self, name: &str) -> Result<(), PromptStoreError> {
        if !self.store.exists(name)? {
            return Err(PromptStoreError::NotFound(name.to_string()));
        }
        let history_folder = self.store.history_folder(name);
        info!(
            "Active system prompt set to '{name}' (history: {})",
            history_folder.display()
        );
        {
            let mut active = self.active_state();
            active.name = name.to_string();
            active.history_folder = history_folder;
        }
        self.listing.invalidate_all();
        Ok(())
    }

    pub fn active_name(&self) -> String {
        self.active_state().name.clone()
    }

    /// The active prompt, falling back to the default if it vanished from disk.
    pub fn active(&self) -> Result<ActivePrompt, PromptStoreError> {
        let name = self.active_name();
        let (name, content) = match self.get(&name) {
            Ok(content) => (name, content),
            Err(PromptStoreError::NotFound(_)) if name != DEFAULT_PROMPT_NAME => {
                warn!("Active prompt '{name}' is missing, falling back to default");
                self.active_state().name = DEFAULT_PROMPT_NAME.to_string();
                let content = self.get(DEFAULT_PROMPT_NAME)?;
                (DEFAULT_PROMPT_NAME.to_string(), content)
            }
            Err(e) => return Err(e),
        };

        Ok(ActivePrompt {
            history_folder: self.store.history_folder(&name),
            name,
            content,
        })
    }

    /// Folder the summary pipeline reads history references from.
    pub fn current_history_folder(&self) -> PathBuf {
        self.active_state().history_folder.clone()
    }
}
