//! foodscout library crate
//!
//! Exposes the vault, the suggestion pipeline and rendering so the binary,
//! benchmarks and tests share one implementation.

pub mod clipboard;
pub mod config;
pub mod error;
pub mod onboarding;
pub mod render;
pub mod secret;
pub mod session;
pub mod store;
pub mod suggest;
pub mod util;
pub mod vault;

pub use error::{Error, Result};
