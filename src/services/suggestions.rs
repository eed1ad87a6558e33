// src/services/suggestions.rs
use crate::models::suggestion::{Suggestion, SuggestionRequest};
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

pub const SUGGESTION_FIELD_MAX: usize = 500;
pub const SUGGESTION_NOTES_MAX: usize = 2000;

pub const MISSING_FIELDS_MESSAGE: &str = "Name and address are required";

#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Validates required fields and caps every field's length
pub fn validate_suggestion(request: SuggestionRequest) -> Result<Suggestion, String> {
    let name = capped(request.name, SUGGESTION_FIELD_MAX);
    let address = capped(request.address, SUGGESTION_FIELD_MAX);

    let (Some(name), Some(address)) = (name, address) else {
        return Err(MISSING_FIELDS_MESSAGE.to_string());
    };

    Ok(Suggestion {
        id: uuid::Uuid::new_v4(),
        name,
        address,
        city: capped(request.city, SUGGESTION_FIELD_MAX),
        cuisine: capped(request.cuisine, SUGGESTION_FIELD_MAX),
        halal_status: capped(request.halal_status, SUGGESTION_FIELD_MAX),
        phone: capped(request.phone, SUGGESTION_FIELD_MAX),
        website: capped(request.website, SUGGESTION_FIELD_MAX),
        notes: capped(request.notes, SUGGESTION_NOTES_MAX),
        email: capped(request.email, SUGGESTION_FIELD_MAX),
        received_at: chrono::Utc::now(),
    })
}

fn capped(value: Option<String>, max: usize) -> Option<String> {
    let trimmed = value?.trim().chars().take(max).collect::<String>();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Where accepted suggestions end up
#[async_trait]
pub trait SuggestionSink: Send + Sync {
    async fn record(&self, suggestion: &Suggestion) -> Result<(), SuggestionError>;
}

#[derive(Debug, Clone)]
pub struct PgSuggestionSink {
    pool: PgPool,
}

impl PgSuggestionSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SuggestionSink for PgSuggestionSink {
    async fn record(&self, suggestion: &Suggestion) -> Result<(), SuggestionError> {
        sqlx::query(
            "INSERT INTO place_suggestions \
             (id, name, address, city, cuisine, halal_status, phone, website, notes, email, received_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(suggestion.id)
        .bind(&suggestion.name)
        .bind(&suggestion.address)
        .bind(&suggestion.city)
        .bind(&suggestion.cuisine)
        .bind(&suggestion.halal_status)
        .bind(&suggestion.phone)
        .bind(&suggestion.website)
        .bind(&suggestion.notes)
        .bind(&suggestion.email)
        .bind(suggestion.received_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(suggestion_id = %suggestion.id, name = %suggestion.name, "place suggestion stored");
        Ok(())
    }
}

/// Writes suggestions to the log only
#[derive(Debug, Clone, Default)]
pub struct LogSuggestionSink;

#[async_trait]
impl SuggestionSink for LogSuggestionSink {
    async fn record(&self, suggestion: &Suggestion) -> Result<(), SuggestionError> {
        tracing::info!(
            suggestion_id = %suggestion.id,
            name = %suggestion.name,
            address = %suggestion.address,
            city = ?suggestion.city,
            "place suggestion received"
        );
        Ok(())
    }
}
