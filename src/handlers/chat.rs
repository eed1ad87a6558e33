// src/handlers/chat.rs
use crate::handlers::{error_response, ApiResult};
use crate::middleware::rate_limit::{chat_rate_limit_middleware, rate_limited_response};
use crate::models::chat::{ChatRequest, ChatResponse};
use crate::services::intent::ResolveError;
use crate::services::place_query::{search_places, CHAT_LIST_LIMIT};
use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use std::sync::Arc;

/// Longest single message forwarded to the model, in characters
pub const MAX_MESSAGE_CHARS: usize = 2000;
/// Retry hint when the upstream 429 carried none
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

pub fn chat_routes() -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .layer(axum::middleware::from_fn(chat_rate_limit_middleware))
}

async fn chat(
    Extension(state): Extension<Arc<AppState>>,
    Json(mut payload): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let has_user_text = payload
        .latest_user_text()
        .map(|t| !t.trim().is_empty())
        .unwrap_or(false);
    if !has_user_text {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "A non-empty user message is required",
        ));
    }

    for message in payload.messages.iter_mut() {
        if message.content.chars().count() > MAX_MESSAGE_CHARS {
            message.content = message.content.chars().take(MAX_MESSAGE_CHARS).collect();
        }
    }

    let resolution = match state.resolver.resolve(&payload).await {
        Ok(resolution) => resolution,
        Err(ResolveError::RateLimited { retry_after }) => {
            return Err(rate_limited_response(
                "The assistant is busy right now. Please try again shortly.",
                retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            ));
        }
    };

    // Chat-panel preview; the client fetches the full set for the map itself
    let places = if resolution.filter.has_store_constraints() {
        match search_places(
            state.place_store.as_ref(),
            &resolution.filter,
            CHAT_LIST_LIMIT as i64,
        )
        .await
        {
            Ok(found) => Some(found.iter().map(|p| p.brief()).collect()),
            Err(e) => {
                tracing::warn!("Chat preview search failed: {}", e);
                None
            }
        }
    } else {
        None
    };

    Ok(Json(ChatResponse {
        filter: resolution.filter,
        message: resolution.message,
        places,
        recommended_place: resolution.recommended_place,
    }))
}
