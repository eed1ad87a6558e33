use crate::AppState;
use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Fixed-window request counter per client key
#[derive(Clone)]
pub struct RateLimiter {
    // client key -> (request_count, window_start)
    clients: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_requests: u32,
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window_duration: Duration::from_secs(window_seconds),
        }
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<String, (u32, Instant)>> {
        // A panic while holding the lock cannot leave the counters inconsistent
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Counts one request. `Err` carries the seconds until the window resets.
    pub fn check_rate_limit(&self, client: &str) -> Result<(), u64> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Result<(), u64> {
        let mut clients = self.clients();

        match clients.get_mut(client) {
            Some((count, window_start)) => {
                let elapsed = now.duration_since(*window_start);
                if elapsed > self.window_duration {
                    *count = 1;
                    *window_start = now;
                    Ok(())
                } else if *count >= self.max_requests {
                    let remaining = self.window_duration.saturating_sub(elapsed);
                    Err(remaining.as_secs().max(1))
                } else {
                    *count += 1;
                    Ok(())
                }
            }
            None => {
                clients.insert(client.to_string(), (1, now));
                Ok(())
            }
        }
    }

    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let window = self.window_duration;
        self.clients()
            .retain(|_, (_, window_start)| now.duration_since(*window_start) <= window);
    }
}

/// Socket address, then a shared bucket. The proxy header is consulted
/// first only when `trust_forwarded` is set; clients can write it freely.
fn client_key(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_forwarded: bool,
) -> String {
    let forwarded = || {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    trust_forwarded
        .then(forwarded)
        .flatten()
        .or_else(|| connect_info.map(|ci| ci.0.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Limits chat requests per client. Over-limit requests get a 429 whose
/// `retryAfter` the chat panel uses for its single retry.
pub async fn chat_rate_limit_middleware(
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        state.trust_proxy_headers,
    );

    if let Err(retry_after) = state.chat_limiter.check_rate_limit(&key) {
        tracing::warn!(client = %key, retry_after, "chat rate limit exceeded");
        return rate_limited_response(
            "Too many requests. Please wait a moment and try again.",
            retry_after,
        );
    }

    // Occasionally clean up expired entries
    if rand::random::<u8>() < 10 {
        state.chat_limiter.cleanup_expired();
    }

    next.run(request).await
}

/// 429 with both a JSON `retryAfter` and a `Retry-After` header
pub fn rate_limited_response(message: &str, retry_after: u64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": message,
            "retryAfter": retry_after
        })),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert("retry-after", value);
    }
    response
}
