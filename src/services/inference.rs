// src/services/inference.rs
//! Deterministic keyword inference used when the completion service is
//! unavailable or returns something unusable.

use crate::models::filter::PlaceFilter;
use regex::Regex;

/// Area used when a browse request carries no usable constraint
pub const DEFAULT_AREA: &str = "Tokyo";

/// Which filter slot a cuisine keyword populates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CuisineSlot {
    Subtype,
    Category,
}

pub struct CuisineKeyword {
    pub pattern: &'static str,
    pub value: &'static str,
    pub slot: CuisineSlot,
}

const fn subtype(pattern: &'static str, value: &'static str) -> CuisineKeyword {
    CuisineKeyword {
        pattern,
        value,
        slot: CuisineSlot::Subtype,
    }
}

const fn category(pattern: &'static str, value: &'static str) -> CuisineKeyword {
    CuisineKeyword {
        pattern,
        value,
        slot: CuisineSlot::Category,
    }
}

/// Ordered most specific first; the first hit wins per slot
pub const CUISINE_KEYWORDS: &[CuisineKeyword] = &[
    subtype("ramen", "Ramen"),
    subtype("sushi", "Sushi"),
    subtype("yakiniku", "Yakiniku"),
    subtype("wagyu", "Wagyu"),
    subtype("yakitori", "Yakitori"),
    subtype("tempura", "Tempura"),
    subtype("udon", "Udon"),
    subtype("soba", "Soba"),
    subtype("gyoza", "Gyoza"),
    subtype("curry", "Curry"),
    subtype("biryani", "Biryani"),
    subtype("kebab", "Kebab"),
    subtype("burgers?", "Burger"),
    subtype("pizza", "Pizza"),
    subtype("shawarma", "Shawarma"),
    subtype("dessert", "Dessert"),
    subtype("cafe|coffee", "Cafe"),
    category("japanese", "Japanese"),
    category("indian", "Indian"),
    category("pakistani", "Pakistani"),
    category("turkish", "Turkish"),
    category("indonesian", "Indonesian"),
    category("malaysian", "Malaysian"),
    category("thai", "Thai"),
    category("chinese", "Chinese"),
    category("korean", "Korean"),
    category("middle eastern|arabic|lebanese", "Middle Eastern"),
    category("italian", "Italian"),
];

/// Known neighbourhoods and cities, matched as whole words
pub const KNOWN_AREAS: &[&str] = &[
    "Shinjuku",
    "Shibuya",
    "Asakusa",
    "Ueno",
    "Ginza",
    "Akihabara",
    "Ikebukuro",
    "Harajuku",
    "Roppongi",
    "Shinagawa",
    "Okachimachi",
    "Kanda",
    "Nihombashi",
    "Odaiba",
    "Tokyo",
    "Osaka",
    "Kyoto",
    "Yokohama",
    "Sapporo",
    "Fukuoka",
    "Nagoya",
];

/// Known tags: (pattern, stored tag)
pub const TAG_KEYWORDS: &[(&str, &str)] = &[
    ("prayer room|prayer space|musholla|mushola", "prayer-room"),
    ("vegan", "vegan"),
    ("vegetarian", "vegetarian"),
    ("family|kids", "family-friendly"),
    ("no alcohol|alcohol[- ]free", "no-alcohol"),
];

/// Price words: (pattern, price level). Comparatives like "cheaper" are
/// follow-ups, not new constraints, and stay unmatched.
pub const PRICE_KEYWORDS: &[(&str, &str)] = &[
    ("cheap|budget|inexpensive|affordable", "Budget"),
    ("mid[- ]range|moderately priced", "Mid-range"),
    ("expensive|upscale|fancy|high[- ]end|luxury", "Upscale"),
];

/// Halal status words: (pattern, status substring)
pub const HALAL_STATUS_KEYWORDS: &[(&str, &str)] = &[
    ("certified", "Certified"),
    ("muslim[- ]friendly", "Muslim-friendly"),
];

lazy_static::lazy_static! {
    static ref CUISINE_PATTERNS: Vec<(Regex, &'static CuisineKeyword)> = CUISINE_KEYWORDS
        .iter()
        .map(|k| (word_regex(k.pattern), k))
        .collect();

    static ref AREA_PATTERNS: Vec<(Regex, &'static str)> = KNOWN_AREAS
        .iter()
        .map(|a| (word_regex(a), *a))
        .collect();

    static ref TAG_PATTERNS: Vec<(Regex, &'static str)> = TAG_KEYWORDS
        .iter()
        .map(|(p, t)| (word_regex(p), *t))
        .collect();

    static ref PRICE_PATTERNS: Vec<(Regex, &'static str)> = PRICE_KEYWORDS
        .iter()
        .map(|(p, level)| (word_regex(p), *level))
        .collect();

    static ref HALAL_PATTERNS: Vec<(Regex, &'static str)> = HALAL_STATUS_KEYWORDS
        .iter()
        .map(|(p, s)| (word_regex(p), *s))
        .collect();

    static ref BROWSE_PATTERN: Regex =
        word_regex("show|find|recommend|recommendation|recommendations|search|list|looking for|where|suggest|any");

    static ref FAVORITES_PATTERN: Regex = word_regex("my favou?rites?|saved places|my saved");
}

/// Case-insensitive whole-word alternation. Patterns are static tables,
/// so a bad one is a programming error caught by the tests below.
fn word_regex(alternation: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).expect("static keyword pattern")
}

/// True when the utterance asks to browse or list places
pub fn is_browse_request(utterance: &str) -> bool {
    BROWSE_PATTERN.is_match(utterance)
}

/// Builds a filter from fixed keyword tables. Pure and deterministic.
pub fn infer_filter(utterance: &str) -> PlaceFilter {
    let mut filter = PlaceFilter::default();

    for (pattern, keyword) in CUISINE_PATTERNS.iter() {
        if !pattern.is_match(utterance) {
            continue;
        }
        let slot = match keyword.slot {
            CuisineSlot::Subtype => &mut filter.cuisine_subtype,
            CuisineSlot::Category => &mut filter.cuisine_category,
        };
        if slot.is_none() {
            *slot = Some(keyword.value.to_string());
        }
    }

    // Prefer the most specific area mentioned: Tokyo sits after the wards
    filter.keyword = AREA_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(utterance))
        .map(|(_, area)| area.to_string());

    filter.tag = TAG_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(utterance))
        .map(|(_, tag)| tag.to_string());

    filter.price_level = PRICE_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(utterance))
        .map(|(_, level)| level.to_string());

    filter.halal_status = HALAL_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(utterance))
        .map(|(_, status)| status.to_string());

    if FAVORITES_PATTERN.is_match(utterance) {
        filter.favorites = Some(true);
    }

    filter
}

/// Known place names that the utterance mentions, case-insensitively
pub fn mentioned_place<'a, I>(text: &str, names: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let haystack = text.to_lowercase();
    names
        .into_iter()
        .filter(|name| name.chars().count() >= 3)
        .find(|name| haystack.contains(&name.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_patterns_compile() {
        assert_eq!(CUISINE_PATTERNS.len(), CUISINE_KEYWORDS.len());
        assert_eq!(AREA_PATTERNS.len(), KNOWN_AREAS.len());
        assert_eq!(TAG_PATTERNS.len(), TAG_KEYWORDS.len());
        assert_eq!(PRICE_PATTERNS.len(), PRICE_KEYWORDS.len());
        assert_eq!(HALAL_PATTERNS.len(), HALAL_STATUS_KEYWORDS.len());
        assert!(is_browse_request("show me"));
        assert!(FAVORITES_PATTERN.is_match("my favorites"));
    }

    #[test]
    fn test_best_ramen_in_shinjuku() {
        let filter = infer_filter("Best ramen in Shinjuku");
        assert_eq!(filter.cuisine_subtype.as_deref(), Some("Ramen"));
        assert_eq!(filter.keyword.as_deref(), Some("Shinjuku"));
        assert_eq!(filter.cuisine_category, None);
        assert_eq!(filter.favorites, None);
    }

    #[test]
    fn test_inference_is_deterministic() {
        let utterance = "Any certified Indian curry near Ueno with a prayer room?";
        let first = infer_filter(utterance);
        let second = infer_filter(utterance);
        assert_eq!(first, second);
        assert_eq!(first.populated_fields(), second.populated_fields());
        assert_eq!(first.cuisine_subtype.as_deref(), Some("Curry"));
        assert_eq!(first.cuisine_category.as_deref(), Some("Indian"));
        assert_eq!(first.keyword.as_deref(), Some("Ueno"));
        assert_eq!(first.tag.as_deref(), Some("prayer-room"));
        assert_eq!(first.halal_status.as_deref(), Some("Certified"));
    }

    #[test]
    fn test_whole_word_matching() {
        // "thailand" must not trigger the Thai category, "sushiro" not sushi
        let filter = infer_filter("trip to thailand, visiting sushiro");
        assert!(filter.is_empty());
    }

    #[test]
    fn test_favorites_and_plural_burgers() {
        let filter = infer_filter("Show burgers from my favourites");
        assert_eq!(filter.cuisine_subtype.as_deref(), Some("Burger"));
        assert_eq!(filter.favorites, Some(true));
    }

    #[test]
    fn test_price_words() {
        assert_eq!(infer_filter("cheap kebab in Ueno").price_level.as_deref(), Some("Budget"));
        assert_eq!(infer_filter("something inexpensive").price_level.as_deref(), Some("Budget"));
        assert_eq!(infer_filter("an upscale dinner").price_level.as_deref(), Some("Upscale"));
        assert_eq!(infer_filter("which one is cheaper?").price_level, None);
    }

    #[test]
    fn test_browse_detection() {
        assert!(is_browse_request("Can you recommend something?"));
        assert!(is_browse_request("where should I eat"));
        assert!(!is_browse_request("thanks a lot"));
        assert!(!is_browse_request("which one is cheaper?"));
    }

    #[test]
    fn test_mentioned_place() {
        let names = ["Naritaya", "Ayam-ya", "Go"];
        assert_eq!(
            mentioned_place("I'd go with NARITAYA for the broth.", names.iter().copied()),
            Some("Naritaya")
        );
        assert_eq!(mentioned_place("Let's go", names.iter().copied()), None);
    }
}
