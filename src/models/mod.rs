// src/models/mod.rs
pub mod chat;
pub mod filter;
pub mod place;
pub mod suggestion;

use serde::Serialize;

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
