// src/handlers/places.rs
use crate::handlers::{error_response, ApiResult};
use crate::models::filter::PlaceFilter;
use crate::models::place::{PlacesResponse, SearchRequest};
use crate::services::place_query::search_places;
use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn place_routes() -> Router {
    Router::new()
        .route("/api/places", get(list_places))
        .route("/api/places/search", post(search))
}

/// Initial map load: everything up to the cap
async fn list_places(Extension(state): Extension<Arc<AppState>>) -> ApiResult<PlacesResponse> {
    run_search(&state, PlaceFilter::default()).await
}

async fn search(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> ApiResult<PlacesResponse> {
    let filter = payload.filter.unwrap_or_default().normalized();
    run_search(&state, filter).await
}

async fn run_search(state: &AppState, filter: PlaceFilter) -> ApiResult<PlacesResponse> {
    match search_places(state.place_store.as_ref(), &filter, state.place_result_cap).await {
        Ok(places) => Ok(Json(PlacesResponse { places })),
        Err(e) => {
            tracing::error!("Place search failed: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load places",
            ))
        }
    }
}
