// src/client/mod.rs
//! Headless client state for the map and chat panels, plus the HTTP client
//! they use to reach the service.
pub mod api;
pub mod chat_view;
pub mod favorites;
pub mod map_view;
pub mod storage;

pub use api::{ApiClientError, ChatApi, HttpChatApi};
pub use chat_view::{ChatView, TurnOutcome};
pub use favorites::{FavoritesStore, GuestQuota};
pub use map_view::{MapView, MarkerState};
pub use storage::{JsonFileStore, KeyValueStore, MemoryKeyValueStore, StorageError};
