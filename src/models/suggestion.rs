// src/models/suggestion.rs
use serde::{Deserialize, Serialize};

/// Body of `POST /api/suggestions`. Everything is optional on the wire so
/// missing required fields surface as a 400 instead of a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub halal_status: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Validated, length-capped suggestion ready to be recorded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub id: uuid::Uuid,
    pub name: String,
    pub address: String,
    pub city: Option<String>,
    pub cuisine: Option<String>,
    pub halal_status: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    pub email: Option<String>,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct SuggestionResponse {
    pub success: bool,
}
