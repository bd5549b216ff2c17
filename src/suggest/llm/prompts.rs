//! Prompts for the three escalation attempts
//!
//! Attempt 1 asks for the answer in the exact schema, attempt 2 asks the
//! model to reformat its own first answer, attempt 3 is a bare schema
//! restatement.

use crate::util::truncate_with_marker;

/// Longest slice of the first answer embedded in the reformat prompt
pub const MAX_REFORMAT_INPUT_CHARS: usize = 8000;

const SCHEMA: &str = r#"{
  "foodDescription": "2-3 sentences describing the dish and what makes it special",
  "restaurants": [
    {
      "name": "Restaurant name",
      "address": "Full street address",
      "mapLink": "https://www.google.com/maps/search/?api=1&query=<url-encoded name and address>",
      "reasons": ["reason 1", "reason 2", "reason 3", "reason 4"]
    },
    {
      "name": "Restaurant name",
      "address": "Full street address",
      "mapLink": "https://www.google.com/maps/search/?api=1&query=<url-encoded name and address>",
      "reasons": ["reason 1", "reason 2", "reason 3", "reason 4"]
    }
  ]
}"#;

/// Attempt 1: the full request with the exact schema.
pub fn suggestion_prompt(city: &str, food: &str) -> String {
    format!(
        r#"You are a local food expert for {city}.

Recommend exactly 2 restaurants in {city} that serve the best "{food}".

OUTPUT FORMAT:
Respond with ONLY one JSON object that matches this schema exactly:
{SCHEMA}

RULES:
- Output ONLY the JSON object. No markdown fences, no commentary before or after.
- Exactly 2 entries in "restaurants", each with exactly 4 short "reasons".
- Use real, currently operating places with their actual street addresses.
- "mapLink" must be a Google Maps search URL for the restaurant name and address.
- Escape any double quotes inside string values."#
    )
}

/// Attempt 2: ask the model to reformat the first answer into the schema.
pub fn reformat_prompt(city: &str, food: &str, first_response: &str) -> String {
    let previous = truncate_with_marker(first_response, MAX_REFORMAT_INPUT_CHARS);
    format!(
        r#"The text below was written in answer to a request for the 2 best restaurants serving "{food}" in {city}, but it is not in the required JSON format.

Reformat it into ONE JSON object matching this schema exactly:
{SCHEMA}

RULES:
- Output ONLY the JSON object, nothing else.
- Keep the restaurants, addresses and reasons from the text; do not invent new ones unless fields are missing.
- Exactly 2 restaurants and at most 4 reasons each.

TEXT TO REFORMAT:
{previous}"#
    )
}

/// Attempt 3: minimal schema restatement.
pub fn minimal_prompt(city: &str, food: &str) -> String {
    format!(
        r#"Return ONLY this JSON, filled in, for the 2 best places to eat "{food}" in {city}:
{{"foodDescription":"","restaurants":[{{"name":"","address":"","mapLink":"","reasons":["","","",""]}},{{"name":"","address":"","mapLink":"","reasons":["","","",""]}}]}}"#
    )
}
