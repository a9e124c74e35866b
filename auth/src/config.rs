//! Digest authentication configuration.
//!
//! Configuration values should be provided by the application, not hardcoded.

use crate::constants::{
    DEFAULT_MAX_LIVE_NONCES, DEFAULT_NONCE_LIFETIME_SECS, DEFAULT_SWEEP_INTERVAL_SECS,
};
use crate::providers::DigestAlgorithm;
use chrono::Duration;

/// Digest authenticator configuration.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    /// Realm used by [`issue_default_challenge`](crate::DigestAuthenticator::issue_default_challenge).
    pub realm: String,

    /// Nonce lifetime used by default challenges and for negative lifetimes.
    ///
    /// Default: 5 minutes
    pub nonce_lifetime: Duration,

    /// Hash algorithm for the response chain.
    ///
    /// Default: MD5
    pub algorithm: DigestAlgorithm,

    /// Protected URI prefixes advertised in challenges.
    pub domain: Vec<String>,

    /// Opaque token advertised in challenges.
    pub opaque: Option<String>,

    /// Maximum number of nonce records held in memory.
    ///
    /// Default: 10 000
    pub max_live_nonces: usize,

    /// Interval between background sweeps.
    ///
    /// Default: 60 seconds
    pub sweep_interval: std::time::Duration,
}

impl DigestConfig {
    /// Create new configuration for `realm`.
    #[must_use]
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            ..Self::default()
        }
    }

    /// Set the nonce lifetime.
    #[must_use]
    pub const fn with_nonce_lifetime(mut self, lifetime: Duration) -> Self {
        self.nonce_lifetime = lifetime;
        self
    }

    /// Set the hash algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the protected URI prefixes.
    #[must_use]
    pub fn with_domain(mut self, domain: Vec<String>) -> Self {
        self.domain = domain;
        self
    }

    /// Set a fixed opaque token.
    #[must_use]
    pub fn with_opaque(mut self, opaque: impl Into<String>) -> Self {
        self.opaque = Some(opaque.into());
        self
    }

    /// Generate a random 192-bit opaque token (base64url).
    #[must_use]
    pub fn with_random_opaque(mut self) -> Self {
        use base64::Engine;
        use rand::RngCore;

        let mut random_bytes = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut random_bytes);
        self.opaque = Some(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes));
        self
    }

    /// Set the nonce table capacity.
    #[must_use]
    pub const fn with_max_live_nonces(mut self, max: usize) -> Self {
        self.max_live_nonces = max;
        self
    }

    /// Set the background sweep interval.
    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: std::time::Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            realm: "composable-rust".to_string(),
            nonce_lifetime: Duration::seconds(DEFAULT_NONCE_LIFETIME_SECS),
            algorithm: DigestAlgorithm::Md5,
            domain: Vec::new(),
            opaque: None,
            max_live_nonces: DEFAULT_MAX_LIVE_NONCES,
            sweep_interval: std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_config_builder() {
        let config = DigestConfig::new("api@example.com")
            .with_nonce_lifetime(Duration::minutes(2))
            .with_algorithm(DigestAlgorithm::Sha256)
            .with_domain(vec!["/api".to_string()])
            .with_opaque("fixed")
            .with_max_live_nonces(50)
            .with_sweep_interval(std::time::Duration::from_secs(5));

        assert_eq!(config.realm, "api@example.com");
        assert_eq!(config.nonce_lifetime, Duration::minutes(2));
        assert_eq!(config.algorithm, DigestAlgorithm::Sha256);
        assert_eq!(config.domain, vec!["/api".to_string()]);
        assert_eq!(config.opaque.as_deref(), Some("fixed"));
        assert_eq!(config.max_live_nonces, 50);
        assert_eq!(config.sweep_interval, std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_digest_config_defaults() {
        let config = DigestConfig::default();
        assert_eq!(config.nonce_lifetime, Duration::minutes(5));
        assert_eq!(config.algorithm, DigestAlgorithm::Md5);
        assert!(config.opaque.is_none());
        assert_eq!(config.max_live_nonces, 10_000);
    }

    #[test]
    fn test_random_opaque_is_unique() {
        let a = DigestConfig::default().with_random_opaque();
        let b = DigestConfig::default().with_random_opaque();

        let a = a.opaque.unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(Some(a), b.opaque);
    }
}
