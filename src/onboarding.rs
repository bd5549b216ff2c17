//! First-run setup
//!
//! Asks for the API key, then a passphrase twice, and stores the key
//! encrypted. The key itself is never echoed or written in plaintext.

use crate::error::{Error, Result};
use crate::secret::SecretPrompt;
use crate::store::{FileStore, KeyValueStore};
use crate::vault::Vault;

const API_KEY_PAGE: &str = "https://aistudio.google.com/app/apikey";
const PASSPHRASE_TRIES: usize = 3;

/// True when nothing is stored yet (or the record cannot be read).
pub fn is_first_run<S: KeyValueStore>(vault: &Vault<S>) -> bool {
    !matches!(vault.load(), Ok(Some(_)))
}

/// Run the setup flow. Returns false when the user entered no key.
pub async fn run_setup<S: KeyValueStore>(vault: &Vault<S>, prompt: &dyn SecretPrompt) -> Result<bool> {
    print_welcome();

    if !is_first_run(vault) {
        println!("  A key is already stored. Finishing setup replaces it.");
        println!();
    }

    let Some(api_key) = prompt.ask_secret("API key (input hidden)").await? else {
        println!();
        println!("  No key entered. You can set up later with: foodscout setup");
        return Ok(false);
    };
    let api_key = api_key.trim();
    if api_key.is_empty() {
        println!();
        println!("  No key entered. You can set up later with: foodscout setup");
        return Ok(false);
    }

    println!();
    println!("  Now pick a passphrase. You'll type it whenever the key is unlocked;");
    println!("  it is never stored, so a forgotten passphrase means running setup again.");
    println!();

    let mut tries = 0;
    loop {
        tries += 1;
        match vault.store_interactive(api_key, prompt).await {
            Ok(()) => break,
            Err(Error::Cancelled) => {
                println!();
                println!("  Cancelled. Run 'foodscout setup' to try again.");
                return Ok(false);
            }
            Err(Error::PassphraseMismatch(reason)) if tries < PASSPHRASE_TRIES => {
                println!("  {}. Let's try that again.", capitalize(reason));
                println!();
            }
            Err(e) => return Err(e),
        }
    }

    println!();
    println!("  ✓ API key encrypted and saved!");
    if let Ok(store) = FileStore::default_location() {
        println!("  ✓ Storage location: {}", store.path().display());
    }
    println!();
    println!("  Try it: foodscout search \"Lyon\" \"Quenelle\"");
    println!();
    Ok(true)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn print_welcome() {
    println!();
    println!("  ─────────────────────────────────────────────────────────────────");
    println!("  foodscout setup");
    println!("  ─────────────────────────────────────────────────────────────────");
    println!();
    println!("  1. Go to: {}", API_KEY_PAGE);
    println!("  2. Create an API key for the Gemini API");
    println!("  3. Paste it below");
    println!();
}
