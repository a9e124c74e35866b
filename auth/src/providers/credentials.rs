//! Credential lookup.
//!
//! The engine never sees a plaintext secret. The user database stores
//! `HA1 = hash(username:realm:secret)` and hands it out by username.

use super::hasher::{DigestHasher, HashError};
use std::collections::HashMap;

/// Read-only view of the user credential store.
///
/// Implementations must be cheap and non-blocking: verification runs
/// synchronously on request-handling threads.
pub trait CredentialLookup: Send + Sync {
    /// Return the stored HA1 for `username`, or `None` if the user is unknown.
    fn ha1(&self, username: &str) -> Option<String>;
}

impl CredentialLookup for HashMap<String, String> {
    fn ha1(&self, username: &str) -> Option<String> {
        self.get(username).cloned()
    }
}

/// A provisioned credential as held by the user database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    /// Username.
    pub username: String,

    /// Precomputed `hash(username:realm:secret)`.
    pub credential_hash: String,
}

impl CredentialEntry {
    /// Compute a credential entry from a plaintext secret.
    ///
    /// Intended for provisioning; the secret is not retained.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the hasher fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use composable_digest_auth::providers::{CredentialEntry, Md5Hasher};
    ///
    /// let entry = CredentialEntry::from_secret("Mufasa", "testrealm@host.com", "Circle Of Life", &Md5Hasher).unwrap();
    /// assert_eq!(entry.credential_hash, "939e7578ed9e3c518a452acee763bce9");
    /// ```
    pub fn from_secret(
        username: &str,
        realm: &str,
        secret: &str,
        hasher: &dyn DigestHasher,
    ) -> Result<Self, HashError> {
        let credential_hash = hasher.hash_hex(&format!("{username}:{realm}:{secret}"))?;
        Ok(Self {
            username: username.to_string(),
            credential_hash,
        })
    }
}
