//! Axum route handlers for system prompt management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;
use crate::system_prompts::{ActivePrompt, PromptInfo};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreatePromptRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePromptRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct PromptListResponse {
    pub active: String,
    pub prompts: Vec<PromptInfo>,
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub name: String,
    pub content: String,
    pub is_active: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/system-prompts
pub async fn handle_list_prompts(
    State(state): State<AppState>,
) -> Result<Json<PromptListResponse>, AppError> {
    let prompts = state.prompts.list()?;
    Ok(Json(PromptListResponse {
        active: state.prompts.active_name(),
        prompts,
    }))
}

/// POST /api/v1/system-prompts
///
/// Creates a prompt. An existing name is rejected with 409.
pub async fn handle_create_prompt(
    State(state): State<AppState>,
    Json(request): Json<CreatePromptRequest>,
) -> Result<(StatusCode, Json<PromptResponse>), AppError> {
    let name = request.name.trim();
    state.prompts.create(name, &request.content)?;
    let content = state.prompts.get(name)?;
    Ok((
        StatusCode::CREATED,
        Json(PromptResponse {
            name: name.to_string(),
            content,
            is_active: false,
        }),
    ))
}

/// GET /api/v1/system-prompts/active
pub async fn handle_get_active_prompt(
    State(state): State<AppState>,
) -> Result<Json<ActivePrompt>, AppError> {
    Ok(Json(state.prompts.active()?))
}

/// GET /api/v1/system-prompts/:name
pub async fn handle_get_prompt(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PromptResponse>, AppError> {
    let content = state.prompts.get(&name)?;
    Ok(Json(PromptResponse {
        is_active: state.prompts.active_name() == name,
        name,
        content,
    }))
}

/// PUT /api/v1/system-prompts/:name
pub async fn handle_update_prompt(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<UpdatePromptRequest>,
) -> Result<Json<PromptResponse>, AppError> {
    state.prompts.update(&name, &request.content)?;
    let content = state.prompts.get(&name)?;
    Ok(Json(PromptResponse {
        is_active: state.prompts.active_name() == name,
        name,
        content,
    }))
}

/// DELETE /api/v1/system-prompts/:name
///
/// The `default` prompt is protected. Deleting the active prompt re-activates it.
pub async fn handle_delete_prompt(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state.prompts.delete(&name)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/system-prompts/:name/activate
///
/// Also switches the history folder summaries read from.
pub async fn handle_activate_prompt(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ActivePrompt>, AppError> {
    state.prompts.set_active(&name)?;
    Ok(Json(state.prompts.active()?))
}
