//! Digest authenticator.
//!
//! The only type the HTTP layer needs: it issues `WWW-Authenticate`
//! values and verifies `Authorization` values. Mapping a rejected
//! [`AuthResult`] to `401 Unauthorized` and attaching a fresh challenge is
//! the caller's job; [`DigestAuthenticator::rechallenge`] builds that
//! challenge with the right `stale` flag.
//!
//! # Example
//!
//! ```
//! use composable_digest_auth::{AuthorizationMessage, ChallengeMessage, DigestAuthenticator, DigestConfig};
//! use composable_digest_auth::authorization::AnswerParams;
//! use composable_digest_auth::mocks::MockCredentialStore;
//! use composable_digest_auth::providers::Md5Hasher;
//!
//! let users = MockCredentialStore::new();
//! let entry = users.add_user("admin", "api", "secret", &Md5Hasher).unwrap();
//! let auth = DigestAuthenticator::new(DigestConfig::new("api"), users);
//!
//! // 401 response carries the challenge
//! let header = auth.issue_challenge("api", 60).unwrap();
//! let challenge = ChallengeMessage::parse(&header).unwrap();
//!
//! // Client answers
//! let answer = AuthorizationMessage::answer(
//!     &challenge,
//!     &AnswerParams {
//!         username: "admin",
//!         ha1: &entry.credential_hash,
//!         method: "GET",
//!         uri: "/reports",
//!         cnonce: "0a4f113b",
//!         nonce_count: 1,
//!     },
//!     &Md5Hasher,
//! )
//! .unwrap();
//!
//! let result = auth.verify("GET", &answer.to_wire_string()).unwrap();
//! assert!(result.ok);
//! assert_eq!(result.username.as_deref(), Some("admin"));
//! ```

use crate::authorization::AuthorizationMessage;
use crate::challenge::ChallengeMessage;
use crate::config::DigestConfig;
use crate::constants::nonce_prefix;
use crate::error::{FailureReason, Result};
use crate::metrics::{OUTCOME_ACCEPTED, VERIFICATIONS};
use crate::nonce_store::NonceStore;
use crate::providers::{Clock, CredentialLookup, DigestHasher, SystemClock};
use crate::verifier::{Verdict, Verifier};
use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;

/// Result of verifying one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthResult {
    /// Whether the request is authenticated.
    pub ok: bool,

    /// Authenticated username (set only when `ok`).
    pub username: Option<String>,

    /// Why the request was rejected (set only when not `ok`).
    pub failure_reason: Option<FailureReason>,
}

impl AuthResult {
    /// Successful authentication.
    #[must_use]
    pub fn accepted(username: impl Into<String>) -> Self {
        Self {
            ok: true,
            username: Some(username.into()),
            failure_reason: None,
        }
    }

    /// Rejected authentication.
    #[must_use]
    pub const fn rejected(reason: FailureReason) -> Self {
        Self {
            ok: false,
            username: None,
            failure_reason: Some(reason),
        }
    }

    /// Returns `true` if the only problem was an expired nonce.
    ///
    /// Clients seeing `stale=true` retry with the new nonce without
    /// prompting the user again.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.failure_reason == Some(FailureReason::NonceExpired)
    }
}

/// Issues Digest challenges and verifies Digest credentials.
///
/// # Type Parameters
///
/// - `C`: Credential lookup (username → HA1)
pub struct DigestAuthenticator<C>
where
    C: CredentialLookup,
{
    config: DigestConfig,
    credentials: C,
    nonces: Arc<NonceStore>,
    verifier: Verifier,
}

impl<C> DigestAuthenticator<C>
where
    C: CredentialLookup,
{
    /// Create an authenticator using the system clock and the configured algorithm.
    #[must_use]
    pub fn new(config: DigestConfig, credentials: C) -> Self {
        Self::with_clock(config, credentials, Arc::new(SystemClock::new()))
    }

    /// Create an authenticator reading time from `clock`.
    #[must_use]
    pub fn with_clock(config: DigestConfig, credentials: C, clock: Arc<dyn Clock>) -> Self {
        let nonces = NonceStore::with_clock(clock)
            .with_default_lifetime(config.nonce_lifetime)
            .with_max_live_nonces(config.max_live_nonces);
        let hasher = config.algorithm.hasher();
        Self::from_parts(config, credentials, Arc::new(nonces), hasher)
    }

    /// Assemble an authenticator from explicit parts.
    ///
    /// Use this to plug in a custom [`DigestHasher`] or to share one
    /// [`NonceStore`] between authenticators.
    #[must_use]
    pub fn from_parts(
        config: DigestConfig,
        credentials: C,
        nonces: Arc<NonceStore>,
        hasher: Arc<dyn DigestHasher>,
    ) -> Self {
        Self {
            config,
            credentials,
            nonces,
            verifier: Verifier::new(hasher),
        }
    }

    /// Issue a challenge for `realm` and return the `WWW-Authenticate` value.
    ///
    /// `lifetime_seconds` of zero yields an already-expired nonce; a
    /// negative value uses the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if `realm` is empty or the nonce table is unusable.
    pub fn issue_challenge(&self, realm: &str, lifetime_seconds: i64) -> Result<String> {
        Ok(self.challenge(realm, lifetime_seconds, false)?.to_wire_string())
    }

    /// Issue a challenge for the configured realm and lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured realm is empty or the nonce
    /// table is unusable.
    pub fn issue_default_challenge(&self) -> Result<String> {
        let challenge = self.issue(&self.config.realm, self.config.nonce_lifetime, false)?;
        Ok(challenge.to_wire_string())
    }

    /// Issue the challenge that should accompany a rejection.
    ///
    /// Sets `stale="true"` when `previous` failed only because its nonce expired.
    ///
    /// # Errors
    ///
    /// Returns an error if `realm` is empty or the nonce table is unusable.
    pub fn rechallenge(
        &self,
        realm: &str,
        lifetime_seconds: i64,
        previous: &AuthResult,
    ) -> Result<String> {
        Ok(self
            .challenge(realm, lifetime_seconds, previous.is_stale())?
            .to_wire_string())
    }

    /// Issue a challenge and return it as a structured message.
    ///
    /// # Errors
    ///
    /// Returns an error if `realm` is empty or the nonce table is unusable.
    pub fn challenge(
        &self,
        realm: &str,
        lifetime_seconds: i64,
        stale: bool,
    ) -> Result<ChallengeMessage> {
        let lifetime = Duration::try_seconds(lifetime_seconds).unwrap_or(if lifetime_seconds < 0 {
            Duration::seconds(-1)
        } else {
            Duration::MAX
        });
        self.issue(realm, lifetime, stale)
    }

    /// Verify an `Authorization` header value for a request made with `method`.
    ///
    /// Every protocol outcome, including malformed headers, is reported in
    /// the returned [`AuthResult`].
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal conditions: a failing hasher or a
    /// poisoned nonce table.
    pub fn verify(&self, method: &str, authorization: &str) -> Result<AuthResult> {
        let message = match AuthorizationMessage::parse(authorization) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed digest authorization");
                return Ok(Self::record(AuthResult::rejected(FailureReason::MalformedRequest)));
            }
        };

        let result = match self
            .verifier
            .verify(method, &message, &self.credentials, &self.nonces)?
        {
            Verdict::Accepted { username } => {
                tracing::info!(
                    username = %username,
                    nonce = nonce_prefix(message.nonce().unwrap_or_default()),
                    "Digest authentication succeeded"
                );
                AuthResult::accepted(username)
            }
            Verdict::Rejected(reason) => {
                tracing::debug!(
                    reason = reason.as_str(),
                    username = %message.username(),
                    "Digest authentication rejected"
                );
                AuthResult::rejected(reason)
            }
        };

        Ok(Self::record(result))
    }

    /// Burn `nonce` explicitly, e.g. on logout.
    ///
    /// # Errors
    ///
    /// Returns an error if the nonce table is unusable.
    pub fn release(&self, nonce: &str) -> Result<()> {
        self.nonces.invalidate(nonce)
    }

    /// Start the background nonce sweeper at the configured interval.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        self.nonces.spawn_sweeper(self.config.sweep_interval)
    }

    /// The nonce store backing this authenticator.
    #[must_use]
    pub const fn nonces(&self) -> &Arc<NonceStore> {
        &self.nonces
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &DigestConfig {
        &self.config
    }

    fn issue(&self, realm: &str, lifetime: Duration, stale: bool) -> Result<ChallengeMessage> {
        let (_, challenge) = self.nonces.issue(realm, lifetime)?;
        Ok(challenge
            .with_domain(self.config.domain.clone())
            .with_stale(stale)
            .with_algorithm(Some(self.verifier.hasher().algorithm().to_string()))
            .with_opaque(self.config.opaque.clone()))
    }

    fn record(result: AuthResult) -> AuthResult {
        let outcome = result
            .failure_reason
            .map_or(OUTCOME_ACCEPTED, FailureReason::as_str);
        metrics::counter!(VERIFICATIONS, "outcome" => outcome).increment(1);
        result
    }
}

impl<C> std::fmt::Debug for DigestAuthenticator<C>
where
    C: CredentialLookup,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestAuthenticator")
            .field("config", &self.config)
            .field("nonces", &self.nonces)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}
