//! Digest response verification.
//!
//! # Algorithm
//!
//! A message using `qop` without `uri`, `cnonce` or `nc` is rejected as
//! `MalformedRequest` before the nonce store is consulted.
//!
//! Steps run in order and stop at the first failure:
//!
//! 1. The nonce must be live (`NonceExpired` / `NonceNotFound`).
//! 2. The nonce counter is incremented unconditionally. The increment is
//!    the serialization point for concurrent requests on one nonce.
//! 3. The new counter, as 8 hex digits, must equal the client's `nc`
//!    (`ReplayOrOutOfOrder`).
//! 4. The user must exist (`UnknownUser`).
//! 5. The expected response is computed:
//!    - with qop: `H(HA1:nonce:nc:cnonce:qop:HA2)`
//!    - without qop: `H(HA1:nonce:HA2)`
//!
//!    where `HA2 = H(method:uri)`.
//! 6. The expected and supplied responses must match (`ResponseMismatch`).
//!
//! Failures at steps 3, 4 and 6 invalidate the nonce. An accepted nonce
//! stays live for later requests at higher counters.
//!
//! A legacy client that sends neither `qop` nor `nc` can use a nonce once:
//! its implicit counter is 1.
//!
//! `realm` and `opaque` are not compared with the issued challenge. The
//! realm is already bound into HA1, and `opaque` is an echo for the HTTP
//! layer, which may check it before calling in.

use crate::authorization::AuthorizationMessage;
use crate::constants::nonce_prefix;
use crate::error::{FailureReason, Result};
use crate::nonce_store::{NonceStatus, NonceStore};
use crate::providers::{CredentialLookup, DigestHasher, HashError};
use std::sync::Arc;

/// Outcome of a verification that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Credentials are valid.
    Accepted {
        /// Authenticated username.
        username: String,
    },

    /// Credentials were rejected.
    Rejected(FailureReason),
}

/// Verifies authorization messages against issued nonces.
#[derive(Clone)]
pub struct Verifier {
    hasher: Arc<dyn DigestHasher>,
}

impl Verifier {
    /// Create a verifier using `hasher` for every hash in the chain.
    #[must_use]
    pub fn new(hasher: Arc<dyn DigestHasher>) -> Self {
        Self { hasher }
    }

    /// The hasher this verifier uses.
    #[must_use]
    pub fn hasher(&self) -> &Arc<dyn DigestHasher> {
        &self.hasher
    }

    /// Verify `message` for a request made with `method`.
    ///
    /// Protocol failures are returned as [`Verdict::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal conditions: a failing hasher or a
    /// poisoned nonce table.
    pub fn verify(
        &self,
        method: &str,
        message: &AuthorizationMessage,
        credentials: &dyn CredentialLookup,
        nonces: &NonceStore,
    ) -> Result<Verdict> {
        if let Some(field) = message.missing_qop_field() {
            tracing::debug!(field, username = %message.username(), "Digest qop field missing");
            return Ok(Verdict::Rejected(FailureReason::MalformedRequest));
        }

        let Some(nonce) = message.nonce() else {
            return Ok(Verdict::Rejected(FailureReason::NonceNotFound));
        };

        match nonces.status(nonce)? {
            NonceStatus::Live(_) => {}
            NonceStatus::Expired => return Ok(Verdict::Rejected(FailureReason::NonceExpired)),
            NonceStatus::Invalidated | NonceStatus::Unknown => {
                return Ok(Verdict::Rejected(FailureReason::NonceNotFound));
            }
        }

        let Some(count) = nonces.increment_counter(nonce)? else {
            // Died between the status check and the increment
            let reason = match nonces.status(nonce)? {
                NonceStatus::Invalidated | NonceStatus::Unknown => FailureReason::NonceNotFound,
                NonceStatus::Live(_) | NonceStatus::Expired => FailureReason::NonceExpired,
            };
            return Ok(Verdict::Rejected(reason));
        };

        if !nonce_count_matches(message, count) {
            tracing::warn!(
                nonce = nonce_prefix(nonce),
                expected = count,
                received = message.nc().unwrap_or("<none>"),
                username = %message.username(),
                "Nonce count replayed or out of order"
            );
            return reject(nonces, nonce, FailureReason::ReplayOrOutOfOrder);
        }

        let Some(ha1) = credentials.ha1(message.username()) else {
            tracing::debug!(username = %message.username(), "Unknown digest user");
            return reject(nonces, nonce, FailureReason::UnknownUser);
        };

        let expected = expected_response(self.hasher.as_ref(), &ha1, method, message)
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    algorithm = self.hasher.algorithm(),
                    "Digest hash function failed"
                );
            })?;

        let matches = constant_time_eq::constant_time_eq(
            expected.to_ascii_lowercase().as_bytes(),
            message.response().to_ascii_lowercase().as_bytes(),
        );
        if !matches {
            tracing::warn!(
                nonce = nonce_prefix(nonce),
                username = %message.username(),
                "Digest response mismatch"
            );
            return reject(nonces, nonce, FailureReason::ResponseMismatch);
        }

        Ok(Verdict::Accepted {
            username: message.username().to_string(),
        })
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("algorithm", &self.hasher.algorithm())
            .finish()
    }
}

/// Compute the response digest a client holding `ha1` should send.
///
/// # Errors
///
/// Returns [`HashError`] if the hasher fails.
pub fn expected_response(
    hasher: &dyn DigestHasher,
    ha1: &str,
    method: &str,
    message: &AuthorizationMessage,
) -> std::result::Result<String, HashError> {
    let uri = message.uri().unwrap_or_default();
    let nonce = message.nonce().unwrap_or_default();
    let ha2 = hasher.hash_hex(&format!("{method}:{uri}"))?;

    match qop_of(message) {
        Some(qop) => {
            let nc = message.nc().unwrap_or_default();
            let cnonce = message.cnonce().unwrap_or_default();
            hasher.hash_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:{qop}:{ha2}"))
        }
        None => hasher.hash_hex(&format!("{ha1}:{nonce}:{ha2}")),
    }
}

fn qop_of(message: &AuthorizationMessage) -> Option<&str> {
    message.qop().filter(|qop| !qop.is_empty())
}

fn nonce_count_matches(message: &AuthorizationMessage, count: u64) -> bool {
    match message.nc() {
        Some(nc) => nc.eq_ignore_ascii_case(&format!("{count:08x}")),
        None => qop_of(message).is_none() && count == 1,
    }
}

fn reject(nonces: &NonceStore, nonce: &str, reason: FailureReason) -> Result<Verdict> {
    nonces.invalidate(nonce)?;
    Ok(Verdict::Rejected(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{FailingHasher, MockCredentialStore};
    use crate::providers::{Md5Hasher, Sha256Hasher};
    use crate::DigestAuthError;
    use chrono::Duration;

    const REALM: &str = "test@realm";

    struct Fixture {
        verifier: Verifier,
        users: MockCredentialStore,
        nonces: NonceStore,
        ha1: String,
    }

    fn fixture(hasher: Arc<dyn DigestHasher>) -> Fixture {
        let users = MockCredentialStore::new();
        let entry = users
            .add_user("admin", REALM, "secret", hasher.as_ref())
            .unwrap();
        Fixture {
            verifier: Verifier::new(hasher),
            users,
            nonces: NonceStore::new(),
            ha1: entry.credential_hash,
        }
    }

    fn signed(f: &Fixture, nonce: &str, nc: &str) -> AuthorizationMessage {
        let message = AuthorizationMessage::new("admin", "")
            .with_realm(REALM)
            .with_nonce(nonce)
            .with_uri("/resource")
            .with_qop("auth")
            .with_cnonce("0a4f113b")
            .with_nc(nc);
        let response = expected_response(f.verifier.hasher().as_ref(), &f.ha1, "GET", &message).unwrap();
        message.with_response(response)
    }

    fn run(f: &Fixture, message: &AuthorizationMessage) -> Verdict {
        f.verifier.verify("GET", message, &f.users, &f.nonces).unwrap()
    }

    #[test]
    fn test_worked_vector() {
        let hasher = Md5Hasher;
        let ha1 = hasher.hash_hex("admin:test@realm:secret").unwrap();
        let ha2 = hasher.hash_hex("GET:/resource").unwrap();
        let expected = hasher
            .hash_hex(&format!("{ha1}:abc123:00000001:0a4f113b:auth:{ha2}"))
            .unwrap();

        let message = AuthorizationMessage::new("admin", "")
            .with_nonce("abc123")
            .with_uri("/resource")
            .with_qop("auth")
            .with_nc("00000001")
            .with_cnonce("0a4f113b");
        assert_eq!(expected_response(&hasher, &ha1, "GET", &message).unwrap(), expected);
    }

    #[test]
    fn test_rfc2069_legacy_vector() {
        // RFC 2069 example response
        let ha1 = Md5Hasher
            .hash_hex("Mufasa:testrealm@host.com:CircleOfLife")
            .unwrap();
        let message = AuthorizationMessage::new("Mufasa", "")
            .with_nonce("dcd98b7102dd2f0e8b11d0f600bfb0c093")
            .with_uri("/dir/index.html");
        assert_eq!(
            expected_response(&Md5Hasher, &ha1, "GET", &message).unwrap(),
            "1949323746fe6a43ef61f9606e7febea"
        );
    }

    #[test]
    fn test_accepts_increasing_counters() {
        let f = fixture(Arc::new(Md5Hasher));
        let (nonce, _) = f.nonces.issue(REALM, Duration::seconds(60)).unwrap();

        for nc in ["00000001", "00000002", "00000003"] {
            assert_eq!(
                run(&f, &signed(&f, &nonce, nc)),
                Verdict::Accepted { username: "admin".to_string() }
            );
        }
        assert!(f.nonces.lookup(&nonce).unwrap().is_some());
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let f = fixture(Arc::new(Md5Hasher));
        let (nonce, _) = f.nonces.issue(REALM, Duration::seconds(60)).unwrap();

        let message = signed(&f, &nonce, "00000001");
        let upper = message.response().to_ascii_uppercase();
        let message = message.with_response(upper);
        assert!(matches!(run(&f, &message), Verdict::Accepted { .. }));
    }

    #[test]
    fn test_skipped_counter_is_rejected() {
        let f = fixture(Arc::new(Md5Hasher));
        let (nonce, _) = f.nonces.issue(REALM, Duration::seconds(60)).unwrap();

        assert_eq!(
            run(&f, &signed(&f, &nonce, "00000002")),
            Verdict::Rejected(FailureReason::ReplayOrOutOfOrder)
        );
        assert!(f.nonces.lookup(&nonce).unwrap().is_none());
    }

    #[test]
    fn test_wrong_password_burns_nonce() {
        let f = fixture(Arc::new(Md5Hasher));
        let (nonce, _) = f.nonces.issue(REALM, Duration::seconds(60)).unwrap();

        let message = signed(&f, &nonce, "00000001").with_response("0".repeat(32));
        assert_eq!(run(&f, &message), Verdict::Rejected(FailureReason::ResponseMismatch));

        let retry = signed(&f, &nonce, "00000002");
        assert_eq!(run(&f, &retry), Verdict::Rejected(FailureReason::NonceNotFound));
    }

    #[test]
    fn test_missing_nonce_field() {
        let f = fixture(Arc::new(Md5Hasher));
        let message = AuthorizationMessage::new("admin", "abc");
        assert_eq!(run(&f, &message), Verdict::Rejected(FailureReason::NonceNotFound));
    }

    #[test]
    fn test_qop_without_counter_is_malformed() {
        let f = fixture(Arc::new(Md5Hasher));
        let (nonce, _) = f.nonces.issue(REALM, Duration::seconds(60)).unwrap();

        let message = AuthorizationMessage::new("admin", "abc")
            .with_nonce(nonce.as_str())
            .with_uri("/resource")
            .with_qop("auth")
            .with_cnonce("0a4f113b");
        assert_eq!(run(&f, &message), Verdict::Rejected(FailureReason::MalformedRequest));

        let record = f.nonces.lookup(&nonce).unwrap().unwrap();
        assert_eq!(record.request_counter, 0);
        assert!(matches!(
            run(&f, &signed(&f, &nonce, "00000001")),
            Verdict::Accepted { .. }
        ));
    }

    #[test]
    fn test_opaque_and_realm_are_advisory() {
        let f = fixture(Arc::new(Md5Hasher));
        let (nonce, _) = f.nonces.issue(REALM, Duration::seconds(60)).unwrap();

        let message = signed(&f, &nonce, "00000001")
            .with_realm("other")
            .with_opaque("unexpected");
        assert!(matches!(run(&f, &message), Verdict::Accepted { .. }));
    }

    #[test]
    fn test_legacy_mode_is_single_use() {
        let f = fixture(Arc::new(Md5Hasher));
        let (nonce, _) = f.nonces.issue(REALM, Duration::seconds(60)).unwrap();

        let message = AuthorizationMessage::new("admin", "")
            .with_nonce(nonce.as_str())
            .with_uri("/resource");
        let response = expected_response(&Md5Hasher, &f.ha1, "GET", &message).unwrap();
        let message = message.with_response(response);

        assert!(matches!(run(&f, &message), Verdict::Accepted { .. }));
        assert_eq!(
            run(&f, &message),
            Verdict::Rejected(FailureReason::ReplayOrOutOfOrder)
        );
    }

    #[test]
    fn test_method_is_bound_into_response() {
        let f = fixture(Arc::new(Md5Hasher));
        let (nonce, _) = f.nonces.issue(REALM, Duration::seconds(60)).unwrap();

        let message = signed(&f, &nonce, "00000001");
        let verdict = f.verifier.verify("POST", &message, &f.users, &f.nonces).unwrap();
        assert_eq!(verdict, Verdict::Rejected(FailureReason::ResponseMismatch));
    }

    #[test]
    fn test_sha256_chain() {
        let f = fixture(Arc::new(Sha256Hasher));
        let (nonce, _) = f.nonces.issue(REALM, Duration::seconds(60)).unwrap();

        let message = signed(&f, &nonce, "00000001");
        assert_eq!(message.response().len(), 64);
        assert!(matches!(run(&f, &message), Verdict::Accepted { .. }));
    }

    #[test]
    fn test_hash_failure_is_fatal() {
        let users = MockCredentialStore::new();
        users.add_user("admin", REALM, "secret", &Md5Hasher).unwrap();
        let nonces = NonceStore::new();
        let (nonce, _) = nonces.issue(REALM, Duration::seconds(60)).unwrap();
        let verifier = Verifier::new(Arc::new(FailingHasher));

        let message = AuthorizationMessage::new("admin", "abc")
            .with_nonce(nonce.as_str())
            .with_uri("/resource")
            .with_qop("auth")
            .with_cnonce("c")
            .with_nc("00000001");

        let result = verifier.verify("GET", &message, &users, &nonces);
        assert!(matches!(result, Err(DigestAuthError::Hash(_))));
    }
}
