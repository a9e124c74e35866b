//! Pluggable digest functions.
//!
//! RFC 2617 fixes MD5; RFC 7616 adds SHA-256. The verifier only sees the
//! [`DigestHasher`] trait, so deployments can swap algorithms without
//! touching the hash chain.

use md5::Md5;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

/// Failures of the hash function itself.
///
/// These are configuration or runtime faults, never protocol outcomes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// No hasher exists for the requested algorithm name.
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The hash function failed to produce a digest.
    #[error("Digest computation failed: {0}")]
    Failed(String),
}

/// One-way digest function producing lowercase hex.
pub trait DigestHasher: Send + Sync {
    /// Algorithm name as advertised in the `algorithm` challenge parameter.
    fn algorithm(&self) -> &str;

    /// Hash `input` and return the lowercase hex digest.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the digest cannot be computed.
    fn hash_hex(&self, input: &str) -> Result<String, HashError>;
}

/// MD5 hasher (RFC 2617).
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Hasher;

impl DigestHasher for Md5Hasher {
    fn algorithm(&self) -> &str {
        DigestAlgorithm::Md5.as_str()
    }

    fn hash_hex(&self, input: &str) -> Result<String, HashError> {
        Ok(hex::encode(Md5::digest(input.as_bytes())))
    }
}

/// SHA-256 hasher (RFC 7616).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl DigestHasher for Sha256Hasher {
    fn algorithm(&self) -> &str {
        DigestAlgorithm::Sha256.as_str()
    }

    fn hash_hex(&self, input: &str) -> Result<String, HashError> {
        Ok(hex::encode(Sha256::digest(input.as_bytes())))
    }
}

/// Built-in digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// `MD5`
    #[default]
    Md5,

    /// `SHA-256`
    Sha256,
}

impl DigestAlgorithm {
    /// Parse an algorithm name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("md5") {
            Some(Self::Md5)
        } else if name.eq_ignore_ascii_case("sha-256") {
            Some(Self::Sha256)
        } else {
            None
        }
    }

    /// Wire name of the algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha256 => "SHA-256",
        }
    }

    /// Hasher implementing this algorithm.
    #[must_use]
    pub fn hasher(self) -> Arc<dyn DigestHasher> {
        match self {
            Self::Md5 => Arc::new(Md5Hasher),
            Self::Sha256 => Arc::new(Sha256Hasher),
        }
    }
}

/// Resolve a hasher from a configured algorithm name.
///
/// # Errors
///
/// Returns [`HashError::UnsupportedAlgorithm`] for unknown names.
///
/// # Examples
///
/// ```
/// use composable_digest_auth::providers::hasher::hasher_for_name;
///
/// assert_eq!(hasher_for_name("sha-256").unwrap().algorithm(), "SHA-256");
/// assert!(hasher_for_name("SHA-512-256").is_err());
/// ```
pub fn hasher_for_name(name: &str) -> Result<Arc<dyn DigestHasher>, HashError> {
    DigestAlgorithm::parse(name)
        .map(DigestAlgorithm::hasher)
        .ok_or_else(|| HashError::UnsupportedAlgorithm(name.to_string()))
}
