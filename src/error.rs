//! Error taxonomy shared by the vault, the store and the suggestion pipeline.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A cryptographic primitive was unavailable or misused.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// AEAD tag check failed: wrong passphrase or tampered ciphertext.
    #[error("wrong passphrase, or the stored API key has been tampered with")]
    Authentication,

    /// The generation endpoint answered with a non-success status.
    #[error("generation endpoint returned HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("request to generation endpoint failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("no API key stored. Run 'foodscout setup' to get started.")]
    NoCredential,

    #[error("passphrase entry cancelled")]
    Cancelled,

    #[error("could not read from terminal: {0}")]
    Prompt(String),

    #[error("{0}")]
    PassphraseMismatch(&'static str),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn storage(err: impl std::fmt::Display) -> Self {
        Error::Storage(err.to_string())
    }
}
