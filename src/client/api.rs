// src/client/api.rs
use crate::models::chat::{ChatRequest, ChatResponse};
use crate::models::filter::PlaceFilter;
use crate::models::place::{Place, PlacesResponse, SearchRequest};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },
    #[error("Request timed out")]
    Timeout,
    #[error("Request cancelled")]
    Cancelled,
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiClientError::Timeout
        } else if e.is_decode() {
            ApiClientError::InvalidResponse(e.to_string())
        } else {
            ApiClientError::Transport(e.to_string())
        }
    }
}

/// The two calls the chat and map views make against the service
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiClientError>;
    async fn search(&self, filter: &PlaceFilter) -> Result<Vec<Place>, ApiClientError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: Option<String>,
    retry_after: Option<u64>,
}

pub struct HttpChatApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn into_error(response: reqwest::Response) -> ApiClientError {
        let status = response.status();
        let header_retry = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.json::<ErrorBody>().await.ok();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = body.as_ref().and_then(|b| b.retry_after).or(header_retry);
            return ApiClientError::RateLimited { retry_after };
        }

        ApiClientError::Server {
            status: status.as_u16(),
            message: body
                .and_then(|b| b.error)
                .unwrap_or_else(|| status.to_string()),
        }
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiClientError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_error(response).await);
        }

        Ok(response.json::<ChatResponse>().await?)
    }

    async fn search(&self, filter: &PlaceFilter) -> Result<Vec<Place>, ApiClientError> {
        let body = SearchRequest {
            filter: Some(filter.clone()),
        };
        let response = self
            .client
            .post(format!("{}/api/places/search", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_error(response).await);
        }

        Ok(response.json::<PlacesResponse>().await?.places)
    }
}
