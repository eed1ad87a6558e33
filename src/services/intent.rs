// src/services/intent.rs
//! Turns a chat conversation into a [`PlaceFilter`] plus a short reply.
//!
//! The completion service is asked for a single JSON object. Its reply goes
//! through a fallback chain: direct parse, then the last balanced `{...}`
//! block carrying a `filter` or `message` key, then keyword inference over
//! the user's own words.

use crate::claude_client::{CompletionClient, LlmError};
use crate::models::chat::{ChatContext, ChatRequest, ChatTurn};
use crate::models::filter::PlaceFilter;
use crate::services::inference::{self, DEFAULT_AREA};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Conversation turns forwarded to the model
pub const HISTORY_WINDOW: usize = 10;
/// Visible places summarized into the prompt for follow-up questions
pub const CONTEXT_PLACE_LIMIT: usize = 20;

pub const TIMEOUT_MESSAGE: &str = "Request timed out. Please try again.";
pub const FAILURE_MESSAGE: &str =
    "Something went wrong while contacting the assistant. Please try again.";
pub const MALFORMED_MESSAGE: &str = "I didn't get a proper response, please try again.";
const DEFAULT_REPLY: &str = "Here's what I found.";

const SYSTEM_PROMPT: &str = r#"You help people find halal restaurants in Japan on a map.
Reply with ONLY one JSON object, no prose before or after it, in this shape:
{"filter": {"cuisine_subtype": string|null, "cuisine_category": string|null, "price_level": string|null, "tag": string|null, "keyword": string|null, "favorites": true|null, "search_terms": [string]|null, "halal_status": string|null}, "message": string, "recommended_place": string|null}

Rules:
- cuisine_subtype is a specific dish or style (Ramen, Sushi, Yakiniku, Curry, Kebab...).
- cuisine_category is a broad cuisine (Japanese, Indian, Turkish, Indonesian...).
- keyword is an area, neighbourhood, station or restaurant name (Shinjuku, Asakusa...).
- tag is one of: prayer-room, vegan, vegetarian, family-friendly, no-alcohol.
- price_level is one of: Budget, Mid-range, Upscale.
- halal_status is Certified or Muslim-friendly, only when the user asks for it.
- favorites is true only when the user asks about their saved or favourite places.
- Use null for anything the user did not ask for. Never invent constraints.
- For follow-up questions about places already shown (cheaper, best rated, closest), keep the previous filter and answer from the listed places; set recommended_place to the exact name you recommend.
- For greetings or off-topic questions keep the previous filter and reply briefly.
- message is one or two friendly sentences."#;

#[derive(Debug)]
pub enum IntentOutcome {
    /// The model produced a usable JSON object
    Resolved {
        filter: PlaceFilter,
        message: Option<String>,
        recommended_place: Option<String>,
    },
    /// The model answered but no intent object could be recovered
    Malformed(String),
    /// The model could not be reached or refused the request
    Unreachable(LlmError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub filter: PlaceFilter,
    pub message: String,
    pub recommended_place: Option<String>,
    pub source: ResolutionSource,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("assistant is rate limited")]
    RateLimited { retry_after: Option<u64> },
}

#[derive(Clone)]
pub struct IntentResolver {
    client: Option<Arc<dyn CompletionClient>>,
}

impl IntentResolver {
    pub fn new(client: Option<Arc<dyn CompletionClient>>) -> Self {
        Self { client }
    }

    pub fn is_model_backed(&self) -> bool {
        self.client.is_some()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.client.as_ref().map(|c| c.model_name())
    }

    /// Resolves the latest user turn. Only a rate limit escapes as an error;
    /// every other failure degrades to keyword inference and a templated reply.
    pub async fn resolve(&self, request: &ChatRequest) -> Result<Resolution, ResolveError> {
        let utterance = request.latest_user_text().unwrap_or_default();
        let context = request.context.clone().unwrap_or_default();
        let last_filter = context.last_filter.clone().map(PlaceFilter::normalized);

        let outcome = self.consult_model(&request.messages, &context).await;

        let resolution = match outcome {
            IntentOutcome::Resolved {
                filter,
                message,
                recommended_place,
            } => {
                let filter = apply_browse_guard(filter, utterance);
                let message = message.unwrap_or_else(|| DEFAULT_REPLY.to_string());
                let recommended_place =
                    recommended_place.or_else(|| recommended_from_context(&message, &context));
                Resolution {
                    filter,
                    message,
                    recommended_place,
                    source: ResolutionSource::Model,
                }
            }
            IntentOutcome::Malformed(raw) => {
                tracing::warn!(
                    raw_len = raw.len(),
                    "completion reply carried no intent object, falling back to keyword inference"
                );
                fallback_resolution(utterance, last_filter, Some(MALFORMED_MESSAGE))
            }
            IntentOutcome::Unreachable(LlmError::RateLimited { retry_after }) => {
                return Err(ResolveError::RateLimited { retry_after });
            }
            IntentOutcome::Unreachable(LlmError::NotConfigured) => {
                fallback_resolution(utterance, last_filter, None)
            }
            IntentOutcome::Unreachable(LlmError::Timeout) => {
                tracing::warn!("completion request timed out, falling back to keyword inference");
                fallback_resolution(utterance, last_filter, Some(TIMEOUT_MESSAGE))
            }
            IntentOutcome::Unreachable(e) => {
                tracing::error!("completion service unreachable: {}", e);
                fallback_resolution(utterance, last_filter, Some(FAILURE_MESSAGE))
            }
        };

        tracing::info!(
            source = ?resolution.source,
            fields = ?resolution.filter.populated_fields(),
            "resolved chat intent"
        );

        Ok(resolution)
    }

    async fn consult_model(&self, messages: &[ChatTurn], context: &ChatContext) -> IntentOutcome {
        let Some(client) = &self.client else {
            return IntentOutcome::Unreachable(LlmError::NotConfigured);
        };

        let window_start = messages.len().saturating_sub(HISTORY_WINDOW);
        let system = build_system_prompt(Some(context));

        match client.complete(&system, &messages[window_start..]).await {
            Ok(text) => parse_intent(&text),
            Err(e) => IntentOutcome::Unreachable(e),
        }
    }
}

/// Fixed instructions plus the previous filter and a digest of the places
/// currently on screen
pub fn build_system_prompt(context: Option<&ChatContext>) -> String {
    let mut prompt = SYSTEM_PROMPT.to_string();
    let Some(context) = context else {
        return prompt;
    };

    if let Some(filter) = context.last_filter.as_ref().filter(|f| !f.is_empty()) {
        if let Ok(json) = serde_json::to_string(filter) {
            prompt.push_str("\n\nPrevious filter:\n");
            prompt.push_str(&json);
        }
    }

    if let Some(places) = context.current_places.as_ref().filter(|p| !p.is_empty()) {
        prompt.push_str("\n\nPlaces currently shown (name | cuisine | city | price | rating):\n");
        for place in places.iter().take(CONTEXT_PLACE_LIMIT) {
            prompt.push_str("- ");
            prompt.push_str(&place.prompt_line());
            prompt.push('\n');
        }
        if places.len() > CONTEXT_PLACE_LIMIT {
            prompt.push_str(&format!("...and {} more\n", places.len() - CONTEXT_PLACE_LIMIT));
        }
    }

    prompt
}

/// Classifies a raw completion into [`IntentOutcome::Resolved`] or
/// [`IntentOutcome::Malformed`]
pub fn parse_intent(text: &str) -> IntentOutcome {
    let Some(value) = extract_intent_json(text) else {
        return IntentOutcome::Malformed(text.to_string());
    };

    // Some replies put the filter slots at the top level
    let filter = match value.get("filter") {
        Some(filter @ Value::Object(_)) => PlaceFilter::from_value(filter),
        _ => PlaceFilter::from_value(&value),
    };

    let non_empty_str = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    IntentOutcome::Resolved {
        filter,
        message: non_empty_str("message"),
        recommended_place: non_empty_str("recommended_place"),
    }
}

/// Direct parse first, then the last balanced `{...}` block that has a
/// `filter` or `message` key
pub fn extract_intent_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if is_intent_object(&value) {
            return Some(value);
        }
    }

    let bytes = trimmed.as_bytes();
    (0..bytes.len())
        .rev()
        .filter(|&i| bytes[i] == b'{')
        .find_map(|start| {
            let end = balanced_end(bytes, start)?;
            serde_json::from_str::<Value>(&trimmed[start..end])
                .ok()
                .filter(is_intent_object)
        })
}

fn is_intent_object(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| obj.contains_key("filter") || obj.contains_key("message"))
        .unwrap_or(false)
}

/// Index one past the `}` closing the object opened at `start`. String
/// literals are skipped so braces inside them do not count.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// An empty filter on an explicit browse request would reset the map to
/// everything; infer from the utterance instead, or fall back to the
/// default area.
fn apply_browse_guard(filter: PlaceFilter, utterance: &str) -> PlaceFilter {
    if !filter.is_empty() || !inference::is_browse_request(utterance) {
        return filter;
    }

    let inferred = inference::infer_filter(utterance);
    if !inferred.is_empty() {
        return inferred;
    }

    PlaceFilter {
        keyword: Some(DEFAULT_AREA.to_string()),
        ..Default::default()
    }
}

/// Keyword-inference path used whenever the model's answer is unusable
pub fn fallback_resolution(
    utterance: &str,
    last_filter: Option<PlaceFilter>,
    notice: Option<&str>,
) -> Resolution {
    let inferred = inference::infer_filter(utterance);

    let filter = if !inferred.is_empty() {
        inferred
    } else if inference::is_browse_request(utterance) {
        apply_browse_guard(PlaceFilter::default(), utterance)
    } else {
        // Nothing recognizable: keep the current view rather than resetting it
        last_filter.unwrap_or_default()
    };

    let summary = if filter.is_empty() {
        None
    } else {
        Some(format!("Here's what I found for {}.", describe_filter(&filter)))
    };

    let message = match (notice, summary) {
        (Some(notice), Some(summary)) => format!("{} Meanwhile: {}", notice, summary),
        (Some(notice), None) => notice.to_string(),
        (None, Some(summary)) => summary,
        (None, None) => {
            "Tell me a cuisine or an area, for example \"ramen in Shinjuku\".".to_string()
        }
    };

    Resolution {
        filter,
        message,
        recommended_place: None,
        source: ResolutionSource::Fallback,
    }
}

/// Human-readable summary such as `Ramen in Shinjuku (prayer-room)`
pub fn describe_filter(filter: &PlaceFilter) -> String {
    let mut what: Vec<&str> = Vec::new();
    if let Some(s) = filter.halal_status.as_deref() {
        what.push(s);
    }
    if let Some(c) = filter.cuisine_category.as_deref() {
        what.push(c);
    }
    if let Some(s) = filter.cuisine_subtype.as_deref() {
        what.push(s);
    }
    if let Some(p) = filter.price_level.as_deref() {
        what.push(p);
    }

    let mut text = if what.is_empty() {
        if filter.favorites_only() {
            "your favourites".to_string()
        } else {
            "halal places".to_string()
        }
    } else {
        what.join(" ")
    };

    if let Some(area) = filter.keyword.as_deref() {
        text.push_str(" in ");
        text.push_str(area);
    }
    if let Some(tag) = filter.tag.as_deref() {
        text.push_str(&format!(" ({})", tag));
    }
    if let Some(terms) = &filter.search_terms {
        text.push_str(&format!(" matching {}", terms.join(", ")));
    }

    text
}

fn recommended_from_context(message: &str, context: &ChatContext) -> Option<String> {
    let places = context.current_places.as_ref()?;
    inference::mentioned_place(message, places.iter().map(|p| p.name.as_str()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::ChatRole;
    use crate::models::place::PlaceDigest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Completion client that replays scripted results and records prompts
    struct ScriptedClient {
        replies: Mutex<Vec<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, system: &str, _messages: &[ChatTurn]) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(system.to_string());
            self.replies.lock().unwrap().pop().unwrap_or(Err(LlmError::Empty))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn request(text: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![ChatTurn {
                role: ChatRole::User,
                content: text.to_string(),
            }],
            context: None,
        }
    }

    #[test]
    fn test_extract_direct_json() {
        let value = extract_intent_json(r#" {"filter": {"keyword": "Asakusa"}, "message": "ok"} "#)
            .unwrap();
        assert_eq!(value["filter"]["keyword"], "Asakusa");
    }

    #[test]
    fn test_extract_after_reasoning_text() {
        let text = r#"Let me think. The user wants {ramen}. Example: {"unrelated": 1}
Final answer:
```json
{"filter": {"cuisine_subtype": "Ramen", "keyword": null}, "message": "Try these {cozy} spots"}
```"#;
        let value = extract_intent_json(text).unwrap();
        assert_eq!(value["filter"]["cuisine_subtype"], "Ramen");
        assert_eq!(value["message"], "Try these {cozy} spots");
    }

    #[test]
    fn test_extract_picks_last_intent_object() {
        let text = r#"{"message": "draft"} then {"message": "final", "filter": {}}"#;
        let value = extract_intent_json(text).unwrap();
        assert_eq!(value["message"], "final");
    }

    #[test]
    fn test_extract_rejects_non_intent_json() {
        assert!(extract_intent_json(r#"{"answer": 42}"#).is_none());
        assert!(extract_intent_json("no json here").is_none());
        assert!(extract_intent_json(r#"{"message": "unterminated"#).is_none());
    }

    #[test]
    fn test_parse_intent_top_level_fields() {
        match parse_intent(r#"{"cuisine_category": "Turkish", "message": "Kebab time"}"#) {
            IntentOutcome::Resolved { filter, message, .. } => {
                assert_eq!(filter.cuisine_category.as_deref(), Some("Turkish"));
                assert_eq!(message.as_deref(), Some("Kebab time"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_browse_guard() {
        let guarded = apply_browse_guard(PlaceFilter::default(), "show me something good");
        assert_eq!(guarded.keyword.as_deref(), Some(DEFAULT_AREA));

        let untouched = apply_browse_guard(PlaceFilter::default(), "thanks!");
        assert!(untouched.is_empty());

        let inferred = apply_browse_guard(PlaceFilter::default(), "find sushi");
        assert_eq!(inferred.cuisine_subtype.as_deref(), Some("Sushi"));
    }

    #[test]
    fn test_fallback_keeps_previous_filter_for_unrecognized_text() {
        let previous = PlaceFilter {
            cuisine_subtype: Some("Ramen".to_string()),
            ..Default::default()
        };
        let resolution = fallback_resolution("which one is cheaper?", Some(previous.clone()), None);
        assert_eq!(resolution.filter, previous);
        assert_eq!(resolution.source, ResolutionSource::Fallback);
    }

    #[test]
    fn test_describe_filter() {
        let filter = PlaceFilter {
            cuisine_subtype: Some("Ramen".to_string()),
            keyword: Some("Shinjuku".to_string()),
            tag: Some("prayer-room".to_string()),
            ..Default::default()
        };
        assert_eq!(describe_filter(&filter), "Ramen in Shinjuku (prayer-room)");
    }

    #[test]
    fn test_system_prompt_includes_context() {
        let context = ChatContext {
            last_filter: Some(PlaceFilter {
                keyword: Some("Ueno".to_string()),
                ..Default::default()
            }),
            current_places: Some(vec![PlaceDigest {
                name: "Halal Ramen Ouka".to_string(),
                cuisine: Some("Ramen".to_string()),
                city: Some("Tokyo".to_string()),
                price_level: None,
                rating: Some(4.5),
            }]),
        };
        let prompt = build_system_prompt(Some(&context));
        assert!(prompt.contains("\"keyword\":\"Ueno\""));
        assert!(prompt.contains("- Halal Ramen Ouka | Ramen | Tokyo | - | 4.5"));
        assert_eq!(build_system_prompt(None), SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_resolve_without_model_uses_inference() {
        let resolver = IntentResolver::new(None);
        let first = resolver.resolve(&request("Best ramen in Shinjuku")).await.unwrap();
        let second = resolver.resolve(&request("Best ramen in Shinjuku")).await.unwrap();

        assert_eq!(first.source, ResolutionSource::Fallback);
        assert_eq!(first.filter.cuisine_subtype.as_deref(), Some("Ramen"));
        assert_eq!(first.filter.keyword.as_deref(), Some("Shinjuku"));
        assert_eq!(first.filter.populated_fields(), second.filter.populated_fields());
        assert!(first.message.contains("Ramen in Shinjuku"));
    }

    #[tokio::test]
    async fn test_resolve_model_reply_with_recommendation() {
        let client = ScriptedClient::new(vec![Ok(
            r#"{"filter": {"cuisine_subtype": "Ramen"}, "message": "Naritaya is the cheapest."}"#
                .to_string(),
        )]);
        let resolver = IntentResolver::new(Some(client.clone()));
        let mut req = request("which is cheaper?");
        req.context = Some(ChatContext {
            last_filter: None,
            current_places: Some(vec![PlaceDigest {
                name: "Naritaya".to_string(),
                cuisine: Some("Ramen".to_string()),
                city: None,
                price_level: Some("Budget".to_string()),
                rating: None,
            }]),
        });

        let resolution = resolver.resolve(&req).await.unwrap();
        assert_eq!(resolution.source, ResolutionSource::Model);
        assert_eq!(resolution.recommended_place.as_deref(), Some("Naritaya"));
        assert!(client.prompts.lock().unwrap()[0].contains("Naritaya | Ramen"));
    }

    #[tokio::test]
    async fn test_resolve_malformed_reply_falls_back() {
        let client = ScriptedClient::new(vec![Ok("Sure! Ramen is great.".to_string())]);
        let resolver = IntentResolver::new(Some(client));
        let resolution = resolver.resolve(&request("ramen in Asakusa")).await.unwrap();

        assert_eq!(resolution.source, ResolutionSource::Fallback);
        assert_eq!(resolution.filter.keyword.as_deref(), Some("Asakusa"));
        assert!(resolution.message.starts_with(MALFORMED_MESSAGE));
    }

    #[tokio::test]
    async fn test_resolve_timeout_and_rate_limit() {
        let client = ScriptedClient::new(vec![
            Err(LlmError::Timeout),
            Err(LlmError::RateLimited { retry_after: Some(2) }),
        ]);
        let resolver = IntentResolver::new(Some(client));

        let timed_out = resolver.resolve(&request("hello")).await.unwrap();
        assert_eq!(timed_out.message, TIMEOUT_MESSAGE);
        assert!(timed_out.filter.is_empty());

        match resolver.resolve(&request("hello")).await {
            Err(ResolveError::RateLimited { retry_after }) => assert_eq!(retry_after, Some(2)),
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_empty_model_filter_on_browse_request() {
        let client = ScriptedClient::new(vec![Ok(
            r#"{"filter": {}, "message": "Here are some places."}"#.to_string(),
        )]);
        let resolver = IntentResolver::new(Some(client));
        let resolution = resolver.resolve(&request("recommend me something")).await.unwrap();
        assert_eq!(resolution.filter.keyword.as_deref(), Some(DEFAULT_AREA));
    }
}
