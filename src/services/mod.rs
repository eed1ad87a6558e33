// src/services/mod.rs
pub mod inference;
pub mod intent;
pub mod place_query;
pub mod sanitize;
pub mod suggestions;

pub use intent::IntentResolver;
pub use place_query::{MemoryPlaceStore, PgPlaceStore, PlaceStore};
pub use suggestions::{LogSuggestionSink, PgSuggestionSink, SuggestionSink};
