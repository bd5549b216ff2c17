//! Secret entry capability
//!
//! The vault never talks to a terminal directly. Anything that needs a
//! passphrase asks a [`SecretPrompt`], which may answer with the secret or
//! with `None` when the user backs out.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::Mutex;
use zeroize::Zeroizing;

#[async_trait]
pub trait SecretPrompt: Send + Sync {
    /// Ask for a secret. `Ok(None)` means the user cancelled.
    async fn ask_secret(&self, prompt: &str) -> Result<Option<Zeroizing<String>>>;
}

/// Hidden-input prompt on the controlling terminal.
///
/// An empty answer or end-of-input counts as a cancel.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl SecretPrompt for TerminalPrompt {
    async fn ask_secret(&self, prompt: &str) -> Result<Option<Zeroizing<String>>> {
        let prompt = format!("  {}: ", prompt);
        let answer = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
            .await
            .map_err(|e| Error::Prompt(e.to_string()))?;

        match answer {
            Ok(secret) => {
                let secret = Zeroizing::new(secret);
                if secret.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(secret))
                }
            }
            Err(err) if matches!(err.kind(), ErrorKind::UnexpectedEof | ErrorKind::Interrupted) => {
                Ok(None)
            }
            Err(err) => Err(Error::Prompt(err.to_string())),
        }
    }
}

/// Prompt that replays canned answers, for tests and non-interactive callers.
///
/// Running out of answers behaves like a cancel.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<Option<String>>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(|a| Some(a.into())).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Queue an explicit cancel.
    pub fn then_cancel(self) -> Self {
        lock(&self.answers).push_back(None);
        self
    }

    /// Prompts shown so far, in order.
    pub fn asked(&self) -> Vec<String> {
        lock(&self.asked).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl SecretPrompt for ScriptedPrompt {
    async fn ask_secret(&self, prompt: &str) -> Result<Option<Zeroizing<String>>> {
        lock(&self.asked).push(prompt.to_string());
        let next = lock(&self.answers).pop_front().flatten();
        Ok(next.map(Zeroizing::new))
    }
}
