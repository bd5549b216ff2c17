//! Plain-text rendering of search outcomes for the terminal

use crate::suggest::{Outcome, RawFallback, RestaurantEntry, SuggestionResult, MAX_REASONS, MAX_RESTAURANTS};
use unicode_width::UnicodeWidthStr;

const RULE: &str = "  ─────────────────────────────────────────────────────────────────";

/// Action hint shown under a raw fallback
pub const RAW_ACTIONS_HINT: &str = "  [r] retry   [c] copy to clipboard   [q] back";

pub fn outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Structured(result) => structured(result),
        Outcome::Raw(raw) => raw_fallback(raw),
    }
}

/// Description followed by up to two restaurant cards.
pub fn structured(result: &SuggestionResult) -> String {
    let mut out = String::new();
    out.push('\n');

    if !result.food_description.is_empty() {
        for line in result.food_description.lines() {
            out.push_str("  ");
            out.push_str(line.trim());
            out.push('\n');
        }
        out.push('\n');
    }

    if result.restaurants.is_empty() {
        out.push_str("  No restaurants came back for this search.\n");
        return out;
    }

    for (i, restaurant) in result.restaurants.iter().take(MAX_RESTAURANTS).enumerate() {
        out.push_str(RULE);
        out.push('\n');
        card(&mut out, i + 1, restaurant);
    }
    out.push_str(RULE);
    out.push('\n');
    out
}

fn card(out: &mut String, number: usize, restaurant: &RestaurantEntry) {
    let name = if restaurant.name.is_empty() {
        "(unnamed)"
    } else {
        restaurant.name.as_str()
    };
    let title = format!("{}. {}", number, name);
    out.push_str(&format!("  {}\n", title));
    out.push_str(&format!("  {}\n", "═".repeat(title.width())));

    if !restaurant.address.is_empty() {
        out.push_str(&format!("  📍 {}\n", restaurant.address));
    }
    out.push_str(&format!("  🗺  {}\n", restaurant.map_url()));

    if !restaurant.reasons.is_empty() {
        out.push('\n');
        for reason in restaurant.reasons.iter().take(MAX_REASONS) {
            out.push_str(&format!("    • {}\n", reason));
        }
    }
}

/// The first model answer verbatim, indented, plus the action hint.
pub fn raw_fallback(raw: &RawFallback) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str("  Couldn't get a structured answer. Here is what the model said:\n");
    out.push_str(RULE);
    out.push('\n');
    let text = raw.raw_text.trim_end();
    if text.is_empty() {
        out.push_str("  (empty response)\n");
    } else {
        for line in text.lines() {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str(RULE);
    out.push('\n');
    out.push_str(RAW_ACTIONS_HINT);
    out.push('\n');
    out
}
