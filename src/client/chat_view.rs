// src/client/chat_view.rs
//! Chat panel state: message history, the current filter and result set,
//! and the turn loop that talks to `/api/chat` and `/api/places/search`.

use crate::client::api::{ApiClientError, ChatApi};
use crate::client::favorites::{FavoritesStore, GuestQuota};
use crate::models::chat::{ChatContext, ChatMessage, ChatRequest, ChatResponse};
use crate::models::filter::PlaceFilter;
use crate::models::place::Place;
use crate::services::intent::{CONTEXT_PLACE_LIMIT, TIMEOUT_MESSAGE};
use crate::services::place_query::CHAT_LIST_LIMIT;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// First try plus one retry after a 429
pub const MAX_CHAT_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

pub const FAILURE_REPLY: &str = "Something went wrong. Please try again.";
pub const RATE_LIMITED_REPLY: &str =
    "The assistant is busy right now. Please wait a moment and try again.";
pub const QUOTA_REPLY: &str =
    "You've used all free questions. Sign in to keep chatting with the assistant.";
pub const SEARCH_FAILURE_REPLY: &str =
    "I couldn't load matching places right now. Showing the previous results.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank input, nothing happened
    Rejected,
    QuotaExhausted,
    Answered,
    Failed,
    Cancelled,
}

pub struct ChatView {
    messages: Vec<ChatMessage>,
    loading: bool,
    retrying: bool,
    filter: PlaceFilter,
    places: Vec<Place>,
    favorites: FavoritesStore,
    guest_quota: Option<GuestQuota>,
    /// Parent of every turn started by [`ChatView::submit`]
    abort: CancellationToken,
    in_flight: Option<CancellationToken>,
    request_timeout: Duration,
}

impl ChatView {
    pub fn new(favorites: FavoritesStore) -> Self {
        Self {
            messages: Vec::new(),
            loading: false,
            retrying: false,
            filter: PlaceFilter::default(),
            places: Vec::new(),
            favorites,
            guest_quota: None,
            abort: CancellationToken::new(),
            in_flight: None,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Anonymous session: chat turns count against the quota
    pub fn with_guest_quota(mut self, quota: GuestQuota) -> Self {
        self.guest_quota = Some(quota);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_retrying(&self) -> bool {
        self.retrying
    }

    pub fn filter(&self) -> &PlaceFilter {
        &self.filter
    }

    /// Full current result set, as drawn on the map
    pub fn places(&self) -> &[Place] {
        &self.places
    }

    /// Clickable subset rendered under an assistant message
    pub fn chat_list(&self) -> &[Place] {
        &self.places[..self.places.len().min(CHAT_LIST_LIMIT)]
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    pub fn favorites_mut(&mut self) -> &mut FavoritesStore {
        &mut self.favorites
    }

    pub fn guest_quota(&self) -> Option<&GuestQuota> {
        self.guest_quota.as_ref()
    }

    /// Handle that aborts the turn [`ChatView::submit`] is running. Take it
    /// before awaiting `submit`; cancelling it while a turn is in flight
    /// drops that turn's result. With no turn in flight it is a no-op.
    pub fn abort_handle(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Initial map load
    pub async fn load_initial<A: ChatApi + ?Sized>(&mut self, api: &A) -> Result<(), ApiClientError> {
        self.places = self.fetch_places(api, &PlaceFilter::default()).await?;
        Ok(())
    }

    /// Re-runs the search for a filter chosen outside the chat (filter chips)
    pub async fn apply_filter<A: ChatApi + ?Sized>(
        &mut self,
        api: &A,
        filter: PlaceFilter,
    ) -> Result<(), ApiClientError> {
        let filter = filter.normalized();
        let places = self.fetch_places(api, &filter).await?;
        self.filter = filter;
        self.places = places;
        Ok(())
    }

    pub async fn submit<A: ChatApi + ?Sized>(&mut self, api: &A, text: &str) -> TurnOutcome {
        if self.abort.is_cancelled() {
            self.abort = CancellationToken::new();
        }
        let token = self.abort.child_token();
        self.submit_with_token(api, text, token).await
    }

    /// Runs one turn that is abandoned as soon as `token` is cancelled
    pub async fn submit_with_token<A: ChatApi + ?Sized>(
        &mut self,
        api: &A,
        text: &str,
        token: CancellationToken,
    ) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Rejected;
        }

        if let Some(quota) = &self.guest_quota {
            if !quota.can_query() {
                self.messages.push(ChatMessage::assistant(QUOTA_REPLY));
                return TurnOutcome::QuotaExhausted;
            }
        }

        // A turn whose future was dropped still owns `in_flight`
        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }
        self.in_flight = Some(token.clone());

        self.messages.push(ChatMessage::user(text));
        self.loading = true;

        if let Some(quota) = self.guest_quota.as_mut() {
            if let Err(e) = quota.increment_used() {
                tracing::warn!("Failed to persist guest query count: {}", e);
            }
        }

        let request = self.build_request();
        let result = self.request_with_retry(api, &request, &token).await;

        if token.is_cancelled() {
            return self.finish_cancelled();
        }

        let outcome = match result {
            Ok(response) => self.commit_response(api, response, &token).await,
            Err(ApiClientError::Cancelled) => return self.finish_cancelled(),
            Err(e) => {
                tracing::warn!("Chat turn failed: {}", e);
                self.messages.push(ChatMessage::assistant(failure_reply(&e)));
                TurnOutcome::Failed
            }
        };

        self.loading = false;
        self.in_flight = None;
        outcome
    }

    /// Cancels any turn in flight, clears the conversation and filter, and
    /// reloads the unfiltered list. Prior places stay if the reload fails.
    pub async fn reset<A: ChatApi + ?Sized>(&mut self, api: &A) -> Result<(), ApiClientError> {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        if self.abort.is_cancelled() {
            self.abort = CancellationToken::new();
        }
        self.messages.clear();
        self.loading = false;
        self.retrying = false;
        self.filter = PlaceFilter::default();

        self.places = self.fetch_places(api, &PlaceFilter::default()).await?;
        Ok(())
    }

    fn build_request(&self) -> ChatRequest {
        let last_filter = if self.filter.is_empty() {
            None
        } else {
            Some(self.filter.clone())
        };
        let current_places = if self.places.is_empty() {
            None
        } else {
            Some(
                self.places
                    .iter()
                    .take(CONTEXT_PLACE_LIMIT)
                    .map(Place::digest)
                    .collect(),
            )
        };

        ChatRequest {
            messages: self.messages.iter().map(ChatMessage::to_turn).collect(),
            context: Some(ChatContext {
                last_filter,
                current_places,
            }),
        }
    }

    async fn request_with_retry<A: ChatApi + ?Sized>(
        &mut self,
        api: &A,
        request: &ChatRequest,
        token: &CancellationToken,
    ) -> Result<ChatResponse, ApiClientError> {
        let mut attempt = 1;
        loop {
            let result = tokio::select! {
                _ = token.cancelled() => Err(ApiClientError::Cancelled),
                outcome = tokio::time::timeout(self.request_timeout, api.chat(request)) => {
                    outcome.unwrap_or(Err(ApiClientError::Timeout))
                }
            };

            match result {
                Err(ApiClientError::RateLimited { retry_after }) if attempt < MAX_CHAT_ATTEMPTS => {
                    let delay = retry_after
                        .map(Duration::from_secs)
                        .unwrap_or(DEFAULT_RETRY_DELAY);
                    tracing::info!("Chat rate limited, retrying in {}s", delay.as_secs());

                    self.retrying = true;
                    self.messages.push(ChatMessage::assistant(format!(
                        "Retrying in {}s...",
                        delay.as_secs()
                    )));

                    let cancelled = tokio::select! {
                        _ = token.cancelled() => true,
                        _ = tokio::time::sleep(delay) => false,
                    };
                    self.retrying = false;
                    if cancelled {
                        return Err(ApiClientError::Cancelled);
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn commit_response<A: ChatApi + ?Sized>(
        &mut self,
        api: &A,
        response: ChatResponse,
        token: &CancellationToken,
    ) -> TurnOutcome {
        let filter = response.filter.normalized();

        let search = if filter == self.filter && !self.places.is_empty() {
            Ok(None)
        } else {
            self.fetch_places(api, &filter).await.map(Some)
        };

        if token.is_cancelled() {
            return self.finish_cancelled();
        }

        let mut reply = ChatMessage::assistant(response.message);
        reply.recommended_place = response.recommended_place;

        match search {
            Ok(places) => {
                if let Some(places) = places {
                    self.places = places;
                }
                reply.show_places = !filter.is_empty();
                self.filter = filter;
                self.messages.push(reply);
            }
            Err(e) => {
                tracing::warn!("Place search after chat turn failed: {}", e);
                self.messages.push(reply);
                self.messages
                    .push(ChatMessage::assistant(SEARCH_FAILURE_REPLY));
            }
        }

        TurnOutcome::Answered
    }

    async fn fetch_places<A: ChatApi + ?Sized>(
        &self,
        api: &A,
        filter: &PlaceFilter,
    ) -> Result<Vec<Place>, ApiClientError> {
        let places = api.search(filter).await?;
        if filter.favorites_only() {
            Ok(self.favorites.retain_favorites(places))
        } else {
            Ok(places)
        }
    }

    fn finish_cancelled(&mut self) -> TurnOutcome {
        self.loading = false;
        self.retrying = false;
        self.in_flight = None;
        if self.abort.is_cancelled() {
            self.abort = CancellationToken::new();
        }
        // Aborts read the same as a timeout
        self.messages.push(ChatMessage::assistant(TIMEOUT_MESSAGE));
        TurnOutcome::Cancelled
    }
}

fn failure_reply(error: &ApiClientError) -> &'static str {
    match error {
        ApiClientError::Timeout => TIMEOUT_MESSAGE,
        ApiClientError::RateLimited { .. } => RATE_LIMITED_REPLY,
        _ => FAILURE_REPLY,
    }
}
