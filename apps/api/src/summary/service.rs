//! Summary orchestration: case input → history reference → prompt → model.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::AppSettings;
use crate::history::{filter_relevant_history, format_history, load_history, HistoryError};
use crate::llm_client::{ConverseRequest, LlmError, ModelCatalog, ModelClient};
use crate::summary::prompt_builder::{
    create_system_message_format, validate_prompt_components, PromptBuilder,
};
use crate::system_prompts::SystemPromptManager;

const MIN_CASE_CHARS: usize = 5;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Model not available: {0}")]
    ModelUnavailable(String),

    #[error("Model invocation failed: {0}")]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequest {
    pub case_input: String,
    #[serde(default)]
    pub model_id: Option<String>,
    /// Overrides the active system prompt for this request only.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Everything sent to the model, without sending it.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedPrompt {
    pub model_id: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub history_folder: PathBuf,
    pub history_included: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutcome {
    pub model_id: String,
    pub summary: String,
}

pub struct SummaryService {
    client: Arc<dyn ModelClient>,
    catalog: Arc<ModelCatalog>,
    prompts: Arc<SystemPromptManager>,
    settings: Arc<AppSettings>,
    builder: PromptBuilder,
}

impl SummaryService {
    pub fn new(
        client: Arc<dyn ModelClient>,
        catalog: Arc<ModelCatalog>,
        prompts: Arc<SystemPromptManager>,
        settings: Arc<AppSettings>,
    ) -> Self {
        Self {
            builder: PromptBuilder::new(settings.prompt),
            client,
            catalog,
            prompts,
            settings,
        }
    }

    /// Case input must be non-blank and at least five characters once trimmed.
    pub fn validate_input(case_input: &str) -> Result<(), SummaryError> {
        let trimmed = case_input.trim();
        if trimmed.is_empty() {
            return Err(SummaryError::InvalidInput(
                "Case input cannot be empty".to_string(),
            ));
        }
        if trimmed.chars().count() < MIN_CASE_CHARS {
            return Err(SummaryError::InvalidInput(format!(
                "Case input is too short (minimum {MIN_CASE_CHARS} characters)"
            )));
        }
        Ok(())
    }

    /// Runs the full pipeline and returns the model's summary.
    pub async fn process_case_summary(
        &self,
        request: &SummaryRequest,
    ) -> Result<SummaryOutcome, SummaryError> {
        let prepared = self.preview(request).await?;
        info!("Generating case summary with {}", prepared.model_id);

        let summary = self
            .client
            .converse(ConverseRequest {
                model_id: &prepared.model_id,
                prompt: &prepared.user_prompt,
                system_prompt: &prepared.system_prompt,
                max_tokens: self.settings.app.max_tokens,
                temperature: self.settings.app.temperature,
            })
            .await?;

        info!("Case summary generated ({} chars)", summary.chars().count());
        Ok(SummaryOutcome {
            model_id: prepared.model_id,
            summary,
        })
    }

    /// Validates the request and assembles the prompts without calling the model.
    pub async fn preview(&self, request: &SummaryRequest) -> Result<PreparedPrompt, SummaryError> {
        Self::validate_input(&request.case_input)?;

        let model_id = match request.model_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.catalog.default_model().await,
        };
        if !self.catalog.is_model_available(&model_id).await {
            return Err(SummaryError::ModelUnavailable(model_id));
        }

        let history_folder = self.prompts.current_history_folder();
        let history = self
            .load_history_reference(&request.case_input, history_folder.clone())
            .await;
        let system_prompt = self.resolve_system_prompt(request.system_prompt.as_deref());
        if !validate_prompt_components(&request.case_input, &system_prompt) {
            return Err(SummaryError::InvalidInput(
                "Case input cannot be empty".to_string(),
            ));
        }
        let user_prompt = self
            .builder
            .build_prompt(&request.case_input, &history, &system_prompt);

        Ok(PreparedPrompt {
            model_id,
            system_prompt,
            user_prompt,
            history_folder,
            history_included: !history.trim().is_empty(),
        })
    }

    /// Scan, format and filter the history folder. Any failure yields no history.
    async fn load_history_reference(&self, case_input: &str, folder: PathBuf) -> String {
        let case_input = case_input.to_string();
        let result = tokio::task::spawn_blocking(move || -> Result<String, HistoryError> {
            let files = load_history(&folder)?;
            if files.is_empty() {
                info!("No history reference files found in {}", folder.display());
                return Ok(String::new());
            }
            let formatted = format_history(&files);
            Ok(filter_relevant_history(&case_input, &formatted))
        })
        .await;

        match result {
            Ok(Ok(history)) => history,
            Ok(Err(e)) => {
                warn!("History processing failed, continuing without history: {e}");
                String::new()
            }
            Err(e) => {
                error!("History loading task failed: {e}");
                String::new()
            }
        }
    }

    /// Request override, then the active managed prompt, then the settings prompt.
    fn resolve_system_prompt(&self, requested: Option<&str>) -> String {
        if let Some(prompt) = requested.filter(|p| !p.trim().is_empty()) {
            return create_system_message_format(prompt);
        }
        match self.prompts.active() {
            Ok(active) => return create_system_message_format(&active.content),
            Err(e) => warn!("Active system prompt unavailable, using settings prompt: {e}"),
        }
        create_system_message_format(&self.settings.system_prompt)
    }
}
