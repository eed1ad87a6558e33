// src/handlers/status.rs
use crate::AppState;
use axum::{extract::Extension, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn status_routes() -> Router {
    Router::new().route("/api/status", get(api_status))
}

async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let db_status = if state.place_store.is_healthy().await {
        "healthy"
    } else {
        "unhealthy"
    };

    let assistant_status = if state.resolver.is_model_backed() {
        "configured"
    } else {
        "keyword_fallback_only"
    };

    Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "database": db_status,
            "assistant": assistant_status,
            "assistant_model": state.resolver.model_name(),
        },
        "limits": {
            "place_result_cap": state.place_result_cap,
        },
        "endpoints": {
            "chat": "/api/chat",
            "search": "/api/places/search",
            "places": "/api/places",
            "suggestions": "/api/suggestions",
            "status": "/api/status"
        }
    }))
}
