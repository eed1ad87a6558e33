// src/models/place.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Words that turn a "certified" status into its opposite
const NEGATIONS: [&str; 4] = ["not", "non", "no", "un"];

/// One restaurant row. Read-only from this service's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Place {
    pub id: i64,
    pub external_place_id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub cuisine_category: Option<String>,
    pub cuisine_subtype: Option<String>,
    pub price_level: Option<String>,
    pub halal_status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub opening_hours: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating: Option<f64>,
}

impl Place {
    /// Most specific cuisine label available
    pub fn cuisine_label(&self) -> Option<&str> {
        self.cuisine_subtype
            .as_deref()
            .or(self.cuisine_category.as_deref())
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// True when the status has the word "certified" and no negation
    /// ("Not certified", "non-certified"). "Uncertified" is one word and
    /// never matches.
    pub fn is_certified(&self) -> bool {
        let Some(status) = self.halal_status.as_deref() else {
            return false;
        };
        let status = status.to_lowercase();
        let words: Vec<&str> = status
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        words.contains(&"certified") && !words.iter().any(|w| NEGATIONS.contains(w))
    }

    pub fn digest(&self) -> PlaceDigest {
        PlaceDigest {
            name: self.name.clone(),
            cuisine: self.cuisine_label().map(str::to_string),
            city: self.city.clone(),
            price_level: self.price_level.clone(),
            rating: self.rating,
        }
    }

    pub fn brief(&self) -> PlaceBrief {
        PlaceBrief {
            id: self.id,
            name: self.name.clone(),
            cuisine: self.cuisine_label().map(str::to_string),
        }
    }
}

/// Compact summary of a visible place, sent back with follow-up questions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDigest {
    pub name: String,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, alias = "price")]
    pub price_level: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

impl PlaceDigest {
    /// Single prompt line: `name | cuisine | city | price | rating`
    pub fn prompt_line(&self) -> String {
        let dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        format!(
            "{} | {} | {} | {} | {}",
            self.name,
            dash(&self.cuisine),
            dash(&self.city),
            dash(&self.price_level),
            self.rating
                .map(|r| format!("{:.1}", r))
                .unwrap_or_else(|| "-".to_string()),
        )
    }
}

/// Entry of the clickable list shown in the chat panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceBrief {
    pub id: i64,
    pub name: String,
    pub cuisine: Option<String>,
}

/// Body of `POST /api/places/search`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub filter: Option<crate::models::filter::PlaceFilter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesResponse {
    pub places: Vec<Place>,
}

#[cfg(test)]
pub(crate) fn sample_place(id: i64, name: &str) -> Place {
    Place {
        id,
        external_place_id: None,
        name: name.to_string(),
        address: None,
        city: None,
        country: Some("Japan".to_string()),
        cuisine_category: None,
        cuisine_subtype: None,
        price_level: None,
        halal_status: None,
        tags: Vec::new(),
        opening_hours: None,
        latitude: None,
        longitude: None,
        rating: None,
    }
}
