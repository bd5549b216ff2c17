//! Restaurant suggestions
//!
//! Structured results decoded from model output, capped so rendering never
//! shows more than two restaurants or four reasons per restaurant.

pub mod llm;

/// Maximum restaurants kept from a response
pub const MAX_RESTAURANTS: usize = 2;
/// Maximum reasons kept per restaurant
pub const MAX_REASONS: usize = 4;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";

/// One suggested place to eat the dish
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub map_link: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub reasons: Vec<String>,
}

impl RestaurantEntry {
    /// The model's map link when it is an http(s) URL, otherwise a maps
    /// search for name and address.
    pub fn map_url(&self) -> String {
        if let Ok(url) = Url::parse(self.map_link.trim()) {
            if matches!(url.scheme(), "http" | "https") {
                return url.to_string();
            }
        }

        let query = [self.name.trim(), self.address.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        match Url::parse_with_params(MAPS_SEARCH_URL, [("api", "1"), ("query", query.as_str())]) {
            Ok(url) => url.to_string(),
            Err(_) => MAPS_SEARCH_URL.to_string(),
        }
    }
}

/// Decoded model answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionResult {
    #[serde(default, deserialize_with = "lenient_string")]
    pub food_description: String,
    #[serde(default, deserialize_with = "lenient_restaurants")]
    pub restaurants: Vec<RestaurantEntry>,
}

impl SuggestionResult {
    /// Decode an extracted JSON object into a capped result.
    ///
    /// Mistyped fields are defaulted rather than failing the whole answer.
    /// Returns `None` when `value` is not an object or carries neither a
    /// description nor any restaurant.
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let result: SuggestionResult = serde_json::from_value(value).ok()?;
        let result = result.normalized();
        if result.food_description.is_empty() && result.restaurants.is_empty() {
            return None;
        }
        Some(result)
    }

    /// Trim text and drop everything past the display caps.
    pub fn normalized(mut self) -> Self {
        self.food_description = self.food_description.trim().to_string();
        self.restaurants.truncate(MAX_RESTAURANTS);
        for restaurant in &mut self.restaurants {
            restaurant.name = restaurant.name.trim().to_string();
            restaurant.address = restaurant.address.trim().to_string();
            restaurant.map_link = restaurant.map_link.trim().to_string();
            restaurant.reasons.retain(|reason| !reason.trim().is_empty());
            restaurant.reasons.truncate(MAX_REASONS);
        }
        self
    }
}

/// Model output that never yielded a usable object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFallback {
    pub raw_text: String,
}

/// What a search flow produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Structured(SuggestionResult),
    Raw(RawFallback),
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Scalars become text; null, objects and arrays become empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_to_string(Value::deserialize(deserializer)?).unwrap_or_default())
}

/// A list of scalars (non-scalars skipped) or a single scalar. Anything
/// else yields no reasons.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other).into_iter().collect(),
    })
}

/// A list of objects (other items skipped) or a single object.
fn lenient_restaurants<'de, D>(deserializer: D) -> Result<Vec<RestaurantEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        value @ Value::Object(_) => vec![value],
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}
