//! Mock hasher for testing fatal hash failures.

use crate::providers::{DigestHasher, HashError};

/// Hasher that always fails.
///
/// Exercises the fatal error path: a broken hash function must surface as
/// an error, never as a rejected response.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingHasher;

impl DigestHasher for FailingHasher {
    fn algorithm(&self) -> &str {
        "BROKEN"
    }

    fn hash_hex(&self, _input: &str) -> Result<String, HashError> {
        Err(HashError::Failed("hasher misconfigured".to_string()))
    }
}
