//! Credential vault
//!
//! The API key is encrypted with AES-256-GCM under a key stretched from the
//! user's passphrase with PBKDF2-HMAC-SHA256. Only the encrypted record is
//! ever persisted; the passphrase is asked for on every unlock and never
//! stored or logged.
//!
//! Record layout in the store (JSON, base64 fields):
//!
//! ```text
//! {"version":1,"ciphertext":"..","iv":"..","salt":"..","iterations":210000,"savedAt":".."}
//! ```

use crate::error::{Error, Result};
use crate::secret::SecretPrompt;
use crate::store::KeyValueStore;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Fixed storage key holding the encrypted credential.
pub const STORAGE_KEY: &str = "encrypted_api_key";

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

/// PBKDF2 rounds used for every new encryption.
pub const PBKDF2_ROUNDS: u32 = 210_000;
/// Records claiming fewer rounds than this are refused.
const MIN_PBKDF2_ROUNDS: u32 = 200_000;

const RECORD_VERSION: u32 = 1;

/// Encrypted API key with the parameters needed to decrypt it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedCredential {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; NONCE_LEN],
    pub salt: [u8; SALT_LEN],
    pub iterations: u32,
}

/// What `load_record` returns: the credential plus when it was written.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub credential: EncryptedCredential,
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRecord {
    version: u32,
    ciphertext: String,
    iv: String,
    salt: String,
    iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
}

/// Stretch a passphrase into a 256-bit key.
pub fn derive_key(passphrase: &str, salt: &[u8], rounds: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, rounds, key.as_mut_slice());
    key
}

fn cipher_for(key: &[u8; KEY_LEN]) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|_| Error::Crypto("invalid AES-256 key length".to_string()))
}

/// Encrypt `plaintext` under `passphrase` with a fresh salt and nonce.
pub fn encrypt(plaintext: &str, passphrase: &str) -> Result<EncryptedCredential> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .and_then(|()| OsRng.try_fill_bytes(&mut iv))
        .map_err(|e| Error::Crypto(format!("random source unavailable: {}", e)))?;

    let key = derive_key(passphrase, &salt, PBKDF2_ROUNDS);
    let ciphertext = cipher_for(&key)?
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| Error::Crypto("AES-GCM encryption failed".to_string()))?;

    Ok(EncryptedCredential {
        ciphertext,
        iv,
        salt,
        iterations: PBKDF2_ROUNDS,
    })
}

/// Decrypt a credential. A wrong passphrase or any tampering fails the AEAD
/// tag check and yields [`Error::Authentication`].
pub fn decrypt(credential: &EncryptedCredential, passphrase: &str) -> Result<Zeroizing<String>> {
    let key = derive_key(passphrase, &credential.salt, credential.iterations);
    let plaintext = cipher_for(&key)?
        .decrypt(Nonce::from_slice(&credential.iv), credential.ciphertext.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| Error::Authentication)?;

    let text = std::str::from_utf8(&plaintext).map_err(|_| Error::Authentication)?;
    Ok(Zeroizing::new(text.to_string()))
}

impl EncryptedCredential {
    fn to_record(&self, saved_at: DateTime<Utc>) -> CredentialRecord {
        CredentialRecord {
            version: RECORD_VERSION,
            ciphertext: BASE64.encode(&self.ciphertext),
            iv: BASE64.encode(self.iv),
            salt: BASE64.encode(self.salt),
            iterations: self.iterations,
            saved_at: Some(saved_at),
        }
    }

    fn from_record(record: CredentialRecord) -> Result<StoredCredential> {
        if record.version != RECORD_VERSION {
            return Err(Error::Storage(format!(
                "unsupported credential record version {}",
                record.version
            )));
        }
        if record.iterations < MIN_PBKDF2_ROUNDS {
            return Err(Error::Storage(format!(
                "credential record uses only {} key-derivation rounds",
                record.iterations
            )));
        }

        let ciphertext = decode_field("ciphertext", &record.ciphertext)?;
        let iv = decode_fixed::<NONCE_LEN>("iv", &record.iv)?;
        let salt = decode_fixed::<SALT_LEN>("salt", &record.salt)?;

        Ok(StoredCredential {
            credential: EncryptedCredential {
                ciphertext,
                iv,
                salt,
                iterations: record.iterations,
            },
            saved_at: record.saved_at,
        })
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| Error::Storage(format!("credential {} is not valid base64: {}", name, e)))
}

fn decode_fixed<const N: usize>(name: &str, value: &str) -> Result<[u8; N]> {
    let bytes = decode_field(name, value)?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        Error::Storage(format!(
            "credential {} has {} bytes, expected {}",
            name,
            bytes.len(),
            N
        ))
    })
}

/// Encrypts, persists and unlocks the API key through a key-value store.
#[derive(Debug)]
pub struct Vault<S> {
    store: S,
}

impl<S: KeyValueStore> Vault<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist an encrypted credential, replacing any previous one.
    pub fn save(&self, credential: &EncryptedCredential) -> Result<()> {
        let record = credential.to_record(Utc::now());
        let json = serde_json::to_string(&record).map_err(Error::storage)?;
        self.store.set(STORAGE_KEY, &json)
    }

    pub fn load(&self) -> Result<Option<EncryptedCredential>> {
        Ok(self.load_record()?.map(|stored| stored.credential))
    }

    pub fn load_record(&self) -> Result<Option<StoredCredential>> {
        let Some(json) = self.store.get(STORAGE_KEY)? else {
            return Ok(None);
        };
        let record: CredentialRecord = serde_json::from_str(&json)
            .map_err(|e| Error::Storage(format!("stored credential is corrupted: {}", e)))?;
        EncryptedCredential::from_record(record).map(Some)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(STORAGE_KEY)?;
        tracing::info!("cleared stored API key");
        Ok(())
    }

    /// Ask for a new passphrase twice, encrypt `api_key` under it and save.
    pub async fn store_interactive(&self, api_key: &str, prompt: &dyn SecretPrompt) -> Result<()> {
        let passphrase = prompt
            .ask_secret("Choose a passphrase to encrypt your API key")
            .await?
            .ok_or(Error::Cancelled)?;
        if passphrase.is_empty() {
            return Err(Error::PassphraseMismatch("passphrase must not be empty"));
        }
        let confirmation = prompt
            .ask_secret("Confirm passphrase")
            .await?
            .ok_or(Error::Cancelled)?;
        if passphrase.as_str() != confirmation.as_str() {
            return Err(Error::PassphraseMismatch("passphrases do not match"));
        }

        let api_key = Zeroizing::new(api_key.to_string());
        let credential = tokio::task::spawn_blocking(move || encrypt(&api_key, &passphrase))
            .await
            .map_err(|e| Error::Crypto(format!("key derivation task failed: {}", e)))??;

        self.save(&credential)?;
        tracing::info!("stored encrypted API key");
        Ok(())
    }

    /// Load the stored credential and decrypt it with a passphrase from `prompt`.
    pub async fn unlock_interactive(&self, prompt: &dyn SecretPrompt) -> Result<Zeroizing<String>> {
        let credential = self.load()?.ok_or(Error::NoCredential)?;
        let passphrase = prompt
            .ask_secret("Passphrase to unlock your API key")
            .await?
            .ok_or(Error::Cancelled)?;

        let result = tokio::task::spawn_blocking(move || decrypt(&credential, &passphrase))
            .await
            .map_err(|e| Error::Crypto(format!("key derivation task failed: {}", e)))?;
        if let Err(Error::Authentication) = &result {
            tracing::warn!("API key unlock failed authentication");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::ScriptedPrompt;
    use crate::store::MemoryStore;

    const API_KEY: &str = "AIzaSy-test-key-0123456789";

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let encrypted = encrypt(API_KEY, "correct horse").unwrap();
        assert_ne!(encrypted.ciphertext, API_KEY.as_bytes());
        assert_eq!(encrypted.iterations, PBKDF2_ROUNDS);

        let decrypted = decrypt(&encrypted, "correct horse").unwrap();
        assert_eq!(decrypted.as_str(), API_KEY);
    }

    #[test]
    fn test_wrong_passphrase_fails_authentication() {
        let encrypted = encrypt(API_KEY, "correct horse").unwrap();
        let result = decrypt(&encrypted, "correct horse!");
        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let mut encrypted = encrypt(API_KEY, "pass").unwrap();
        encrypted.ciphertext[0] ^= 0x01;
        assert!(matches!(decrypt(&encrypted, "pass"), Err(Error::Authentication)));

        let mut encrypted = encrypt(API_KEY, "pass").unwrap();
        encrypted.iv[0] ^= 0x01;
        assert!(matches!(decrypt(&encrypted, "pass"), Err(Error::Authentication)));
    }

    #[test]
    fn test_each_encryption_uses_fresh_salt_and_iv() {
        let e1 = encrypt(API_KEY, "same-pass").unwrap();
        let e2 = encrypt(API_KEY, "same-pass").unwrap();
        assert_ne!(e1.salt, e2.salt);
        assert_ne!(e1.iv, e2.iv);
        assert_ne!(e1.ciphertext, e2.ciphertext);
        assert_eq!(decrypt(&e2, "same-pass").unwrap().as_str(), API_KEY);
    }

    #[test]
    fn test_derive_key_depends_on_salt() {
        let a = derive_key("pass", &[0u8; SALT_LEN], 1_000);
        let b = derive_key("pass", &[1u8; SALT_LEN], 1_000);
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_save_load_clear() {
        let vault = Vault::new(MemoryStore::new());
        assert!(vault.load().unwrap().is_none());

        let encrypted = encrypt(API_KEY, "pass").unwrap();
        vault.save(&encrypted).unwrap();
        let record = vault.load_record().unwrap().unwrap();
        assert_eq!(record.credential, encrypted);
        assert!(record.saved_at.is_some());

        vault.clear().unwrap();
        assert!(vault.load().unwrap().is_none());
    }

    #[test]
    fn test_load_rejects_bad_iv_length() {
        let vault = Vault::new(MemoryStore::new());
        let record = serde_json::json!({
            "version": 1,
            "ciphertext": BASE64.encode([1u8, 2, 3]),
            "iv": BASE64.encode([0u8; 8]),
            "salt": BASE64.encode([0u8; SALT_LEN]),
            "iterations": PBKDF2_ROUNDS,
        });
        vault.store().set(STORAGE_KEY, &record.to_string()).unwrap();
        assert!(matches!(vault.load(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_load_rejects_weak_iteration_count() {
        let vault = Vault::new(MemoryStore::new());
        let mut record = encrypt(API_KEY, "pass").unwrap().to_record(Utc::now());
        record.iterations = 1_000;
        let json = serde_json::to_string(&record).unwrap();
        vault.store().set(STORAGE_KEY, &json).unwrap();
        assert!(matches!(vault.load(), Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn test_store_then_unlock_interactive() {
        let vault = Vault::new(MemoryStore::new());
        let setup = ScriptedPrompt::new(["hunter22", "hunter22"]);
        vault.store_interactive(API_KEY, &setup).await.unwrap();
        assert_eq!(setup.asked().len(), 2);

        let unlock = ScriptedPrompt::new(["hunter22"]);
        let key = vault.unlock_interactive(&unlock).await.unwrap();
        assert_eq!(key.as_str(), API_KEY);
    }

    #[tokio::test]
    async fn test_store_interactive_rejects_mismatched_confirmation() {
        let vault = Vault::new(MemoryStore::new());
        let prompt = ScriptedPrompt::new(["hunter22", "hunter23"]);
        let result = vault.store_interactive(API_KEY, &prompt).await;
        assert!(matches!(result, Err(Error::PassphraseMismatch(_))));
        assert!(vault.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_interactive_rejects_empty_passphrase() {
        let vault = Vault::new(MemoryStore::new());
        let prompt = ScriptedPrompt::new(["", ""]);
        let result = vault.store_interactive(API_KEY, &prompt).await;
        assert!(matches!(result, Err(Error::PassphraseMismatch(_))));
    }

    #[tokio::test]
    async fn test_unlock_without_stored_key() {
        let vault = Vault::new(MemoryStore::new());
        let prompt = ScriptedPrompt::new(["anything"]);
        let result = vault.unlock_interactive(&prompt).await;
        assert!(matches!(result, Err(Error::NoCredential)));
        assert!(prompt.asked().is_empty());
    }

    #[tokio::test]
    async fn test_unlock_cancelled() {
        let vault = Vault::new(MemoryStore::new());
        vault.save(&encrypt(API_KEY, "pass").unwrap()).unwrap();
        let prompt = ScriptedPrompt::default();
        let result = vault.unlock_interactive(&prompt).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
