// lib.rs - Halal restaurant map: chat-driven filter resolution service and client state
pub mod claude_client;
pub mod client;
pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::middleware::rate_limit::RateLimiter;
use crate::services::{IntentResolver, PlaceStore, SuggestionSink};

// Re-export commonly used types for convenience
pub use models::chat::{ChatMessage, ChatRequest, ChatResponse, ChatRole, ChatTurn};
pub use models::filter::PlaceFilter;
pub use models::place::Place;

/// Shared state handed to every handler through `Extension<Arc<AppState>>`
pub struct AppState {
    pub place_store: Arc<dyn PlaceStore>,
    pub suggestion_sink: Arc<dyn SuggestionSink>,
    pub resolver: IntentResolver,
    pub chat_limiter: RateLimiter,
    /// Whether the chat limiter may key clients by `X-Forwarded-For`
    pub trust_proxy_headers: bool,
    pub place_result_cap: i64,
}

/// All routes with logging, CORS and shared state applied
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(handlers::chat::chat_routes())
        .merge(handlers::places::place_routes())
        .merge(handlers::suggestions::suggestion_routes())
        .merge(handlers::status::status_routes())
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}
