use std::sync::Arc;

use crate::config::AppSettings;
use crate::llm_client::{ModelCatalog, ModelClient};
use crate::summary::SummaryService;
use crate::system_prompts::{PromptStore, PromptStoreError, SystemPromptManager};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<AppSettings>,
    pub catalog: Arc<ModelCatalog>,
    pub prompts: Arc<SystemPromptManager>,
    pub summaries: Arc<SummaryService>,
}

impl AppState {
    /// Wires the prompt manager, model catalog and summary service around `client`.
    pub fn new(settings: AppSettings, client: Arc<dyn ModelClient>) -> Result<Self, PromptStoreError> {
        let prompt_settings = &settings.app.system_prompts;
        let store = PromptStore::new(
            &prompt_settings.prompts_folder,
            &settings.history_folder,
            &prompt_settings.prompt_file_extension,
            prompt_settings.auto_create_history_folders,
        )?;
        let prompts = Arc::new(SystemPromptManager::new(store, &prompt_settings.active_prompt)?);

        let settings = Arc::new(settings);
        let catalog = Arc::new(ModelCatalog::new(client.clone(), settings.models.clone()));
        let summaries = Arc::new(SummaryService::new(
            client,
            catalog.clone(),
            prompts.clone(),
            settings.clone(),
        ));

        Ok(Self {
            settings,
            catalog,
            prompts,
            summaries,
        })
    }
}
