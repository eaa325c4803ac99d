//! Axum route handlers for the Summary API and the model catalog.

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::UiModelOption;
use crate::state::AppState;
use crate::summary::service::{PreparedPrompt, SummaryRequest};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub request_id: Uuid,
    pub model_id: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub prompt: PreparedPrompt,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub title: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub default_model: String,
    pub active_prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub default_model: String,
    pub models: Vec<UiModelOption>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/summaries
///
/// Runs the full pipeline: history lookup, prompt assembly and model call.
pub async fn handle_create_summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<SummaryResponse>, AppError> {
    let request_id = Uuid::new_v4();
    info!(%request_id, "Summary requested");

    let outcome = state.summaries.process_case_summary(&request).await?;

    Ok(Json(SummaryResponse {
        request_id,
        model_id: outcome.model_id,
        summary: outcome.summary,
    }))
}

/// POST /api/v1/summaries/preview
///
/// Returns the prompts that would be sent, without invoking a model.
pub async fn handle_preview_summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<PreviewResponse>, AppError> {
    let request_id = Uuid::new_v4();
    let prompt = state.summaries.preview(&request).await?;
    info!(%request_id, "Prompt preview built ({} chars)", prompt.user_prompt.chars().count());

    Ok(Json(PreviewResponse { request_id, prompt }))
}

/// GET /api/v1/config
pub async fn handle_get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let app = &state.settings.app;
    Json(ConfigResponse {
        title: app.title.clone(),
        max_tokens: app.max_tokens,
        temperature: app.temperature,
        default_model: state.catalog.default_model().await,
        active_prompt: state.prompts.active_name(),
    })
}

/// GET /api/v1/models
///
/// Category separators (disabled) followed by that category's models.
pub async fn handle_list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        default_model: state.catalog.default_model().await,
        models: state.catalog.models_for_ui().await,
    })
}

/// POST /api/v1/models/refresh
pub async fn handle_refresh_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    state.catalog.refresh().await;
    handle_list_models(State(state)).await
}
