// src/models/filter.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured search filter shared by the chat resolver, the client view
/// state and the place query builder.
///
/// Every slot is optional. A filter with no populated slot means "no
/// constraint". Serialization always emits every slot so clients see
/// explicit `null`s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceFilter {
    #[serde(default)]
    pub cuisine_subtype: Option<String>,
    #[serde(default)]
    pub cuisine_category: Option<String>,
    #[serde(default)]
    pub price_level: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub favorites: Option<bool>,
    #[serde(default)]
    pub search_terms: Option<Vec<String>>,
    #[serde(default)]
    pub halal_status: Option<String>,
}

/// Slot names as they appear in JSON
pub const FILTER_FIELDS: [&str; 8] = [
    "cuisine_subtype",
    "cuisine_category",
    "price_level",
    "tag",
    "keyword",
    "favorites",
    "search_terms",
    "halal_status",
];

/// Stored price vocabulary. None is a substring of another, so a substring
/// match on the price column selects exactly one level.
pub const PRICE_LEVELS: [&str; 3] = ["Budget", "Mid-range", "Upscale"];

/// Maps yen shorthand (`¥`, `¥¥`, `¥¥¥`) and level names in any case onto
/// [`PRICE_LEVELS`]. Unknown values pass through unchanged.
pub fn canonical_price_level(value: &str) -> String {
    let value = value.trim();
    let yen = value.chars().filter(|c| matches!(c, '¥' | '￥')).count();
    if yen > 0 && yen == value.chars().count() {
        return PRICE_LEVELS[yen.min(PRICE_LEVELS.len()) - 1].to_string();
    }

    let folded = value.to_lowercase().replace(' ', "-");
    PRICE_LEVELS
        .iter()
        .find(|level| level.to_lowercase() == folded || (folded == "midrange" && **level == "Mid-range"))
        .map(|level| level.to_string())
        .unwrap_or_else(|| value.to_string())
}

impl PlaceFilter {
    pub fn is_empty(&self) -> bool {
        self.cuisine_subtype.is_none()
            && self.cuisine_category.is_none()
            && self.price_level.is_none()
            && self.tag.is_none()
            && self.keyword.is_none()
            && self.favorites.is_none()
            && self.search_terms.is_none()
            && self.halal_status.is_none()
    }

    /// True when a slot the store filters on is populated. `favorites` is
    /// resolved client-side and does not count.
    pub fn has_store_constraints(&self) -> bool {
        let mut without_favorites = self.clone();
        without_favorites.favorites = None;
        !without_favorites.is_empty()
    }

    pub fn favorites_only(&self) -> bool {
        self.favorites == Some(true)
    }

    /// Trims every string slot and drops the ones that end up empty
    pub fn normalized(self) -> Self {
        let search_terms = self.search_terms.and_then(|terms| {
            let terms: Vec<String> = terms
                .into_iter()
                .filter_map(|t| non_empty(Some(t)))
                .collect();
            if terms.is_empty() {
                None
            } else {
                Some(terms)
            }
        });

        Self {
            cuisine_subtype: non_empty(self.cuisine_subtype),
            cuisine_category: non_empty(self.cuisine_category),
            price_level: non_empty(self.price_level).map(|p| canonical_price_level(&p)),
            tag: non_empty(self.tag),
            keyword: non_empty(self.keyword),
            favorites: self.favorites,
            search_terms,
            halal_status: non_empty(self.halal_status),
        }
    }

    /// Lenient decode of a model-produced filter object.
    ///
    /// Wrong-typed slots become `None` instead of failing the whole object;
    /// `favorites` is only kept when it is a JSON boolean.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

        let search_terms = match obj.get("search_terms") {
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            Some(Value::String(single)) => Some(vec![single.clone()]),
            _ => None,
        };

        Self {
            cuisine_subtype: text("cuisine_subtype"),
            cuisine_category: text("cuisine_category"),
            price_level: text("price_level"),
            tag: text("tag"),
            keyword: text("keyword"),
            favorites: obj.get("favorites").and_then(Value::as_bool),
            search_terms,
            halal_status: text("halal_status"),
        }
        .normalized()
    }

    /// Names of the populated slots, in declaration order
    pub fn populated_fields(&self) -> Vec<&'static str> {
        let flags = [
            self.cuisine_subtype.is_some(),
            self.cuisine_category.is_some(),
            self.price_level.is_some(),
            self.tag.is_some(),
            self.keyword.is_some(),
            self.favorites.is_some(),
            self.search_terms.is_some(),
            self.halal_status.is_some(),
        ];
        FILTER_FIELDS
            .iter()
            .zip(flags)
            .filter_map(|(name, set)| set.then_some(*name))
            .collect()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
