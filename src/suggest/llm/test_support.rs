//! Fakes for exercising the pipeline without a real endpoint

use super::client::GenerationBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Canned endpoint reply: HTTP status plus body.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 reply wrapping `text` in the usual candidates envelope.
    pub fn model_text(text: &str) -> Self {
        Self::ok(model_envelope(text))
    }
}

/// `text` wrapped in the usual candidates envelope.
pub(crate) fn model_envelope(text: &str) -> String {
    serde_json::json!({
        "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
    })
    .to_string()
}

/// Mock-server path for `model` with the key query pair.
pub(crate) fn generate_path(model: &str, api_key: &str) -> String {
    format!("/models/{}:generateContent?key={}", model, api_key)
}

/// Endpoint base pointing at a mock server.
pub(crate) fn mock_base(server: &mockito::Server) -> String {
    format!("{}/models", server.url())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-process backend that replays replies and records prompts.
#[derive(Debug, Default)]
pub(crate) struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, prompt: &str, _api_key: &str) -> Result<String> {
        lock(&self.prompts).push(prompt.to_string());
        let reply = lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Reply::status(500, "no reply queued"));
        if (200..300).contains(&reply.status) {
            Ok(super::client::response_text(&reply.body))
        } else {
            Err(Error::Transport {
                status: reply.status,
                body: reply.body,
            })
        }
    }
}
