// src/handlers/suggestions.rs
use crate::handlers::{error_response, ApiResult};
use crate::models::suggestion::{SuggestionRequest, SuggestionResponse};
use crate::services::suggestions::validate_suggestion;
use crate::AppState;
use axum::{extract::Extension, http::StatusCode, response::Json, routing::post, Router};
use std::sync::Arc;

pub fn suggestion_routes() -> Router {
    Router::new().route("/api/suggestions", post(submit_suggestion))
}

async fn submit_suggestion(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<SuggestionRequest>,
) -> ApiResult<SuggestionResponse> {
    let suggestion = validate_suggestion(payload)
        .map_err(|message| error_response(StatusCode::BAD_REQUEST, message))?;

    if let Err(e) = state.suggestion_sink.record(&suggestion).await {
        tracing::error!("Failed to record suggestion {}: {}", suggestion.id, e);
        return Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save suggestion",
        ));
    }

    Ok(Json(SuggestionResponse { success: true }))
}
