use crate::config::Config;
use crate::error::{Error, Result};
use crate::util::truncate_str;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Maximum length of an error body carried in [`Error::Transport`]
pub const MAX_ERROR_BODY_CHARS: usize = 400;

/// One prompt in, the model's generated text out.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &str, api_key: &str) -> Result<String>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// Client for a `generateContent` text-generation endpoint
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint_base: String,
    model: String,
}

impl GeminiClient {
    pub fn new(endpoint_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint_base: endpoint_base.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.endpoint_base.clone(), config.model.clone())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `{base}/{model}:generateContent?key={api_key}`
    fn endpoint(&self, api_key: &str) -> Result<Url> {
        let raw = format!(
            "{}/{}:generateContent",
            self.endpoint_base.trim_end_matches('/'),
            self.model
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| Error::Config(format!("endpoint '{}' is not a valid URL: {}", raw, e)))?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn generate(&self, prompt: &str, api_key: &str) -> Result<String> {
        let url = self.endpoint(api_key)?;
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        // reqwest errors embed the request URL, which carries the key
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Request(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), model = %self.model, "generation endpoint error");
            return Err(Error::Transport {
                status: status.as_u16(),
                body: truncate_str(&body, MAX_ERROR_BODY_CHARS).to_string(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Request(e.without_url()))?;
        Ok(response_text(&text))
    }
}

/// Known envelope layouts, in the order they are probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    /// `candidates[0].content.parts[*].text`
    CandidateParts(String),
    /// `candidates[0].output` or `candidates[0].output.content.text`
    CandidateOutput(String),
    /// `candidates[0].content.text` or `candidates[0].text`
    CandidateText(String),
    /// `output` or `output.content.text`
    Output(String),
    /// top-level `text`
    Text(String),
    /// Nothing matched; the whole envelope, pretty-printed
    Unknown(String),
}

impl ResponseShape {
    pub fn classify(envelope: &Value) -> Self {
        let candidate = envelope.pointer("/candidates/0");

        if let Some(text) = candidate.and_then(joined_parts) {
            return ResponseShape::CandidateParts(text);
        }
        if let Some(text) = candidate.and_then(|c| first_string(c, &["/output", "/output/content/text"])) {
            return ResponseShape::CandidateOutput(text);
        }
        if let Some(text) = candidate.and_then(|c| first_string(c, &["/content/text", "/text"])) {
            return ResponseShape::CandidateText(text);
        }
        if let Some(text) = first_string(envelope, &["/output", "/output/content/text"]) {
            return ResponseShape::Output(text);
        }
        if let Some(text) = first_string(envelope, &["/text"]) {
            return ResponseShape::Text(text);
        }

        let dump = serde_json::to_string_pretty(envelope).unwrap_or_else(|_| envelope.to_string());
        ResponseShape::Unknown(dump)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResponseShape::CandidateParts(_) => "candidate_parts",
            ResponseShape::CandidateOutput(_) => "candidate_output",
            ResponseShape::CandidateText(_) => "candidate_text",
            ResponseShape::Output(_) => "output",
            ResponseShape::Text(_) => "text",
            ResponseShape::Unknown(_) => "unknown",
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ResponseShape::CandidateParts(text)
            | ResponseShape::CandidateOutput(text)
            | ResponseShape::CandidateText(text)
            | ResponseShape::Output(text)
            | ResponseShape::Text(text)
            | ResponseShape::Unknown(text) => text,
        }
    }
}

fn joined_parts(candidate: &Value) -> Option<String> {
    let parts = candidate.pointer("/content/parts")?.as_array()?;
    let texts: Vec<&str> = parts
        .iter()
        .filter_map(|part| part.get("text")?.as_str())
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}

fn first_string(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .find_map(|pointer| value.pointer(pointer)?.as_str().map(str::to_string))
}

/// Generated text from a success body; a body that is not JSON is returned as-is.
pub fn response_text(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(envelope) => {
            let shape = ResponseShape::classify(&envelope);
            if matches!(shape, ResponseShape::Unknown(_)) {
                tracing::warn!("unrecognised response envelope; using it verbatim");
            } else {
                tracing::debug!(shape = shape.name(), "response envelope");
            }
            shape.into_text()
        }
        Err(_) => body.to_string(),
    }
}
