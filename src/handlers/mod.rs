// src/handlers/mod.rs
pub mod chat;
pub mod places;
pub mod status;
pub mod suggestions;

use crate::models::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

pub type ApiResult<T> = Result<Json<T>, Response>;

/// `{ "error": message }` with the given status
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}
