pub mod health;

use axum::{
    response::Html,
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::summary::handlers as summaries;
use crate::system_prompts::handlers as prompts;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// GET /
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health::health_handler))
        // Summary API
        .route("/api/v1/config", get(summaries::handle_get_config))
        .route("/api/v1/models", get(summaries::handle_list_models))
        .route(
            "/api/v1/models/refresh",
            post(summaries::handle_refresh_models),
        )
        .route("/api/v1/summaries", post(summaries::handle_create_summary))
        .route(
            "/api/v1/summaries/preview",
            post(summaries::handle_preview_summary),
        )
        // System prompt API
        .route(
            "/api/v1/system-prompts",
            get(prompts::handle_list_prompts).post(prompts::handle_create_prompt),
        )
        .route(
            "/api/v1/system-prompts/active",
            get(prompts::handle_get_active_prompt),
        )
        .route(
            "/api/v1/system-prompts/:name",
            get(prompts::handle_get_prompt)
                .put(prompts::handle_update_prompt)
                .delete(prompts::handle_delete_prompt),
        )
        .route(
            "/api/v1/system-prompts/:name/activate",
            post(prompts::handle_activate_prompt),
        )
        .with_state(state)
}
