//! Three-attempt suggestion flow
//!
//! Model output is not guaranteed to be well-formed JSON, so each search
//! runs a fixed escalation: the direct request, a reformat of the first
//! answer, then a minimal schema restatement. Only parse failures escalate;
//! transport failures end the flow at once. When every attempt fails to
//! parse, the first answer is returned as raw text.

use super::client::GenerationBackend;
use super::parse::extract_first_json;
use super::prompts;
use crate::error::Result;
use crate::secret::SecretPrompt;
use crate::session::Session;
use crate::store::KeyValueStore;
use crate::suggest::{Outcome, RawFallback, SuggestionResult};
use crate::vault::Vault;
use uuid::Uuid;

/// One prompt/parse cycle of the escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Direct,
    Reformat,
    Minimal,
}

/// The fixed attempt sequence. Its length is the whole retry budget.
pub const ESCALATION: [Attempt; 3] = [Attempt::Direct, Attempt::Reformat, Attempt::Minimal];

impl Attempt {
    fn prompt(self, city: &str, food: &str, first_response: Option<&str>) -> String {
        match self {
            Attempt::Direct => prompts::suggestion_prompt(city, food),
            Attempt::Reformat => {
                prompts::reformat_prompt(city, food, first_response.unwrap_or_default())
            }
            Attempt::Minimal => prompts::minimal_prompt(city, food),
        }
    }
}

/// Decode model text into a structured result, if it holds one.
pub fn structured_from_text(text: &str) -> Option<SuggestionResult> {
    let extracted = extract_first_json(text)?;
    SuggestionResult::from_value(extracted.value)
}

#[derive(Debug)]
pub struct SuggestionPipeline<B> {
    backend: B,
}

impl<B: GenerationBackend> SuggestionPipeline<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run the escalation for one city/food pair.
    pub async fn fetch_suggestions(&self, city: &str, food: &str, api_key: &str) -> Result<Outcome> {
        let city = city.trim();
        let food = food.trim();
        let flow = Uuid::new_v4();
        let mut first_response: Option<String> = None;

        for (index, attempt) in ESCALATION.iter().copied().enumerate() {
            let prompt = attempt.prompt(city, food, first_response.as_deref());
            tracing::debug!(%flow, attempt = index + 1, kind = ?attempt, "requesting suggestions");

            let text = self.backend.generate(&prompt, api_key).await?;
            if let Some(result) = structured_from_text(&text) {
                tracing::debug!(
                    %flow,
                    attempt = index + 1,
                    restaurants = result.restaurants.len(),
                    "structured result"
                );
                return Ok(Outcome::Structured(result));
            }

            tracing::debug!(%flow, attempt = index + 1, chars = text.len(), "no usable JSON in response");
            if first_response.is_none() {
                first_response = Some(text);
            }
        }

        tracing::warn!(%flow, attempts = ESCALATION.len(), "falling back to raw text");
        Ok(Outcome::Raw(RawFallback {
            raw_text: first_response.unwrap_or_default(),
        }))
    }

    /// Unlock the API key through the session if needed, then fetch.
    ///
    /// Used for both the first search and raw-fallback retries; with a
    /// cached session key no passphrase is asked for.
    pub async fn search<S: KeyValueStore>(
        &self,
        session: &mut Session,
        vault: &Vault<S>,
        prompt: &dyn SecretPrompt,
        city: &str,
        food: &str,
    ) -> Result<Outcome> {
        let api_key = session.credential(vault, prompt).await?;
        self.fetch_suggestions(city, food, api_key).await
    }
}
