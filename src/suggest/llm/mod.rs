pub mod client;
pub mod parse;
pub mod pipeline;
pub mod prompts;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{GeminiClient, GenerationBackend, ResponseShape};
pub use parse::{extract_first_json, ExtractedJson};
pub use pipeline::{structured_from_text, Attempt, SuggestionPipeline, ESCALATION};
