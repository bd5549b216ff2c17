//! Session-scoped state
//!
//! A `Session` lives as long as one interactive run. It caches the
//! decrypted API key so repeated searches (and raw-fallback retries) ask for
//! the passphrase only once. Nothing in here is ever persisted.

use crate::error::{Error, Result};
use crate::secret::SecretPrompt;
use crate::store::KeyValueStore;
use crate::vault::Vault;
use zeroize::Zeroizing;

#[derive(Default)]
pub struct Session {
    credential: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Cache a plaintext key for the rest of the session.
    pub fn remember(&mut self, credential: Zeroizing<String>) {
        self.credential = Some(credential);
    }

    /// Forget the cached key. The stored encrypted copy is untouched.
    pub fn clear(&mut self) {
        self.credential = None;
    }

    /// Return the cached key, unlocking the vault through `prompt` if needed.
    pub async fn credential<S: KeyValueStore>(
        &mut self,
        vault: &Vault<S>,
        prompt: &dyn SecretPrompt,
    ) -> Result<&str> {
        if self.credential.is_none() {
            let key = vault.unlock_interactive(prompt).await?;
            tracing::debug!("API key unlocked for this session");
            self.credential = Some(key);
        }

        match &self.credential {
            Some(key) => Ok(key.as_str()),
            None => Err(Error::NoCredential),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::ScriptedPrompt;
    use crate::store::MemoryStore;
    use crate::vault::encrypt;

    #[tokio::test]
    async fn test_credential_is_cached_after_first_unlock() {
        let vault = Vault::new(MemoryStore::new());
        vault.save(&encrypt("key-123", "pass").unwrap()).unwrap();
        let prompt = ScriptedPrompt::new(["pass"]);
        let mut session = Session::new();

        assert_eq!(session.credential(&vault, &prompt).await.unwrap(), "key-123");
        assert_eq!(session.credential(&vault, &prompt).await.unwrap(), "key-123");
        assert_eq!(prompt.asked().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_forces_another_prompt() {
        let vault = Vault::new(MemoryStore::new());
        vault.save(&encrypt("key-123", "pass").unwrap()).unwrap();
        let prompt = ScriptedPrompt::new(["pass", "pass"]);
        let mut session = Session::new();

        session.credential(&vault, &prompt).await.unwrap();
        session.clear();
        assert!(!session.has_credential());
        session.credential(&vault, &prompt).await.unwrap();
        assert_eq!(prompt.asked().len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_stored_and_nothing_cached() {
        let vault = Vault::new(MemoryStore::new());
        let prompt = ScriptedPrompt::new(["pass"]);
        let mut session = Session::new();
        let result = session.credential(&vault, &prompt).await;
        assert!(matches!(result, Err(Error::NoCredential)));
    }

    #[tokio::test]
    async fn test_wrong_passphrase_is_not_cached() {
        let vault = Vault::new(MemoryStore::new());
        vault.save(&encrypt("key-123", "pass").unwrap()).unwrap();
        let prompt = ScriptedPrompt::new(["wrong"]);
        let mut session = Session::new();

        let result = session.credential(&vault, &prompt).await;
        assert!(matches!(result, Err(Error::Authentication)));
        assert!(!session.has_credential());
    }

    #[test]
    fn test_debug_redacts_key() {
        let mut session = Session::new();
        session.remember(Zeroizing::new("super-secret".to_string()));
        let debug = format!("{:?}", session);
        assert!(!debug.contains("super-secret"));
    }
}
