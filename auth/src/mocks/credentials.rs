//! Mock credential store for testing.

use crate::providers::{CredentialEntry, CredentialLookup, DigestHasher, HashError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory credential store.
///
/// Holds `username -> HA1`. Users are added from plaintext secrets so tests
/// read naturally; only the HA1 is kept.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Debug, Clone, Default)]
pub struct MockCredentialStore {
    users: Arc<Mutex<HashMap<String, String>>>,
}

impl MockCredentialStore {
    /// Create an empty credential store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user, hashing `username:realm:secret` with `hasher`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the hasher fails.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn add_user(
        &self,
        username: &str,
        realm: &str,
        secret: &str,
        hasher: &dyn DigestHasher,
    ) -> Result<CredentialEntry, HashError> {
        let entry = CredentialEntry::from_secret(username, realm, secret, hasher)?;
        self.users
            .lock()
            .unwrap()
            .insert(entry.username.clone(), entry.credential_hash.clone());
        Ok(entry)
    }

    /// Remove a user.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn remove_user(&self, username: &str) {
        self.users.lock().unwrap().remove(username);
    }
}

impl CredentialLookup for MockCredentialStore {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    fn ha1(&self, username: &str) -> Option<String> {
        self.users.lock().unwrap().get(username).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Md5Hasher;

    #[test]
    fn test_add_and_remove_user() {
        let store = MockCredentialStore::new();
        let entry = store
            .add_user("admin", "test@realm", "secret", &Md5Hasher)
            .unwrap();

        assert_eq!(store.ha1("admin"), Some(entry.credential_hash));

        store.remove_user("admin");
        assert_eq!(store.ha1("admin"), None);
    }
}
