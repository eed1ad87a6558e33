// src/services/place_query.rs
//! Place Query Service: turns a [`PlaceFilter`] into a bounded read of the
//! `places` table.
//!
//! Distinct filter dimensions are ANDed; alternatives inside one dimension
//! (subtype vs. category, name vs. address vs. city) are ORed.

use crate::models::filter::{canonical_price_level, PlaceFilter};
use crate::models::place::Place;
use crate::services::sanitize::{contains_pattern, sanitize_input};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use thiserror::Error;

/// Upper bound on rows returned by any search
pub const PLACE_RESULT_CAP: i64 = 2000;
/// Rows listed in the chat panel
pub const CHAT_LIST_LIMIT: usize = 10;

const PLACE_COLUMNS: &str = "id, external_place_id, name, address, city, country, \
     cuisine_category, cuisine_subtype, price_level, halal_status, tags, opening_hours, \
     latitude, longitude, rating";

const KEYWORD_COLUMNS: [&str; 3] = ["name", "address", "city"];
const SEARCH_TERM_COLUMNS: [&str; 5] = ["name", "address", "city", "cuisine_category", "cuisine_subtype"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Place store unavailable: {0}")]
    Unavailable(String),
}

/// Sanitized, store-ready form of a filter. `favorites` is not part of it:
/// favorites live on the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceQuery {
    pub cuisine_subtype: Option<String>,
    pub cuisine_category: Option<String>,
    pub keyword: Option<String>,
    pub tag: Option<String>,
    pub price_level: Option<String>,
    pub halal_status: Option<String>,
    pub search_terms: Vec<String>,
}

impl PlaceQuery {
    pub fn from_filter(filter: &PlaceFilter) -> Self {
        let clean = |v: &Option<String>| sanitize_input(v.as_deref());

        Self {
            cuisine_subtype: clean(&filter.cuisine_subtype),
            cuisine_category: clean(&filter.cuisine_category),
            keyword: clean(&filter.keyword),
            tag: clean(&filter.tag),
            price_level: clean(&filter.price_level).map(|p| canonical_price_level(&p)),
            halal_status: clean(&filter.halal_status),
            search_terms: filter
                .search_terms
                .iter()
                .flatten()
                .filter_map(|t| sanitize_input(Some(t)))
                .collect(),
        }
    }

    /// No predicate at all: the full (capped) list
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }

    /// Appends the `WHERE` clause, if any, with every value bound
    pub fn push_where(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        let mut first = true;
        let mut begin_clause = |builder: &mut QueryBuilder<'static, Postgres>| {
            builder.push(if first { " WHERE " } else { " AND " });
            first = false;
        };

        if self.cuisine_subtype.is_some() || self.cuisine_category.is_some() {
            begin_clause(builder);
            let mut alternatives = Vec::new();
            if let Some(subtype) = &self.cuisine_subtype {
                alternatives.push(("cuisine_subtype", subtype.clone()));
            }
            if let Some(category) = &self.cuisine_category {
                alternatives.push(("cuisine_category", category.clone()));
            }
            push_ilike_any(builder, alternatives);
        }

        if let Some(keyword) = &self.keyword {
            begin_clause(builder);
            push_ilike_any(
                builder,
                KEYWORD_COLUMNS.iter().map(|c| (*c, keyword.clone())).collect(),
            );
        }

        if let Some(tag) = &self.tag {
            begin_clause(builder);
            builder.push_bind(tag.clone()).push(" = ANY(tags)");
        }

        if let Some(price) = &self.price_level {
            begin_clause(builder);
            builder.push("price_level ILIKE ").push_bind(contains_pattern(price));
        }

        if let Some(status) = &self.halal_status {
            begin_clause(builder);
            builder.push("halal_status ILIKE ").push_bind(contains_pattern(status));
        }

        if !self.search_terms.is_empty() {
            begin_clause(builder);
            let alternatives = self
                .search_terms
                .iter()
                .flat_map(|term| SEARCH_TERM_COLUMNS.iter().map(move |c| (*c, term.clone())))
                .collect();
            push_ilike_any(builder, alternatives);
        }
    }

    /// In-memory evaluation with the same semantics as [`Self::push_where`]
    pub fn matches(&self, place: &Place) -> bool {
        let cuisine_ok = match (&self.cuisine_subtype, &self.cuisine_category) {
            (None, None) => true,
            (subtype, category) => {
                subtype
                    .as_deref()
                    .map(|s| contains_ci(place.cuisine_subtype.as_deref(), s))
                    .unwrap_or(false)
                    || category
                        .as_deref()
                        .map(|c| contains_ci(place.cuisine_category.as_deref(), c))
                        .unwrap_or(false)
            }
        };

        let keyword_ok = self
            .keyword
            .as_deref()
            .map(|k| keyword_columns(place).iter().any(|col| contains_ci(*col, k)))
            .unwrap_or(true);

        let tag_ok = self
            .tag
            .as_deref()
            .map(|t| place.tags.iter().any(|pt| pt == t))
            .unwrap_or(true);

        let price_ok = self
            .price_level
            .as_deref()
            .map(|p| contains_ci(place.price_level.as_deref(), p))
            .unwrap_or(true);

        let halal_ok = self
            .halal_status
            .as_deref()
            .map(|s| contains_ci(place.halal_status.as_deref(), s))
            .unwrap_or(true);

        let terms_ok = self.search_terms.is_empty()
            || self.search_terms.iter().any(|term| {
                search_term_columns(place)
                    .iter()
                    .any(|col| contains_ci(*col, term))
            });

        cuisine_ok && keyword_ok && tag_ok && price_ok && halal_ok && terms_ok
    }
}

/// `(a ILIKE $1 OR b ILIKE $2 ...)`
fn push_ilike_any(builder: &mut QueryBuilder<'static, Postgres>, alternatives: Vec<(&str, String)>) {
    builder.push("(");
    for (i, (column, value)) in alternatives.into_iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder
            .push(column)
            .push(" ILIKE ")
            .push_bind(contains_pattern(&value));
    }
    builder.push(")");
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

fn keyword_columns(place: &Place) -> [Option<&str>; 3] {
    [
        Some(place.name.as_str()),
        place.address.as_deref(),
        place.city.as_deref(),
    ]
}

fn search_term_columns(place: &Place) -> [Option<&str>; 5] {
    [
        Some(place.name.as_str()),
        place.address.as_deref(),
        place.city.as_deref(),
        place.cuisine_category.as_deref(),
        place.cuisine_subtype.as_deref(),
    ]
}

/// Full `SELECT` for a query, ordered best-rated first and capped at `limit`
pub fn build_search_sql(query: &PlaceQuery, limit: i64) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {} FROM places", PLACE_COLUMNS));
    query.push_where(&mut builder);
    builder
        .push(" ORDER BY rating DESC NULLS LAST, name ASC LIMIT ")
        .push_bind(limit.clamp(0, PLACE_RESULT_CAP));
    builder
}

/// Result ordering shared by every store implementation
pub fn compare_places(a: &Place, b: &Place) -> Ordering {
    match (a.rating, b.rating) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.name.cmp(&b.name))
}

/// Read access to the restaurant table
#[async_trait]
pub trait PlaceStore: Send + Sync {
    async fn search(&self, query: &PlaceQuery, limit: i64) -> Result<Vec<Place>, StoreError>;

    async fn is_healthy(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct PgPlaceStore {
    pool: PgPool,
}

impl PgPlaceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaceStore for PgPlaceStore {
    async fn search(&self, query: &PlaceQuery, limit: i64) -> Result<Vec<Place>, StoreError> {
        let mut builder = build_search_sql(query, limit);
        tracing::debug!(sql = builder.sql(), "searching places");
        let places = builder.build_query_as::<Place>().fetch_all(&self.pool).await?;
        Ok(places)
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

/// Store over a fixed list, used by tests and offline demos
#[derive(Debug, Clone, Default)]
pub struct MemoryPlaceStore {
    places: Vec<Place>,
}

impl MemoryPlaceStore {
    pub fn new(places: Vec<Place>) -> Self {
        Self { places }
    }
}

#[async_trait]
impl PlaceStore for MemoryPlaceStore {
    async fn search(&self, query: &PlaceQuery, limit: i64) -> Result<Vec<Place>, StoreError> {
        let mut found: Vec<Place> = self
            .places
            .iter()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        found.sort_by(compare_places);
        found.truncate(limit.clamp(0, PLACE_RESULT_CAP) as usize);
        Ok(found)
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

/// Runs a filter against a store. An empty filter is the full capped list.
pub async fn search_places(
    store: &dyn PlaceStore,
    filter: &PlaceFilter,
    cap: i64,
) -> Result<Vec<Place>, StoreError> {
    let query = PlaceQuery::from_filter(filter);
    if query.is_unconstrained() {
        tracing::debug!("no store constraints, returning unfiltered list");
    }

    let places = store.search(&query, cap).await?;
    tracing::info!(count = places.len(), "place search completed");
    Ok(places)
}
