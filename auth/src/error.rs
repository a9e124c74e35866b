//! Error types for digest authentication.
//!
//! Two kinds of failure exist. Protocol outcomes (a bad nonce, a replayed
//! counter, a wrong password) are expected and travel inside
//! [`AuthResult`](crate::authenticator::AuthResult) as a [`FailureReason`].
//! Fatal conditions (a broken hash function, a poisoned lock) surface as
//! [`DigestAuthError`].

use crate::providers::hasher::HashError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for digest authentication operations.
pub type Result<T> = std::result::Result<T, DigestAuthError>;

/// Header parsing and message construction errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Header value does not start with the expected scheme token.
    #[error("Header must start with the {expected} scheme")]
    MissingScheme {
        /// Scheme token that was expected
        expected: &'static str,
    },

    /// A required field is absent.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A required field is present but empty.
    #[error("Required field is empty: {0}")]
    EmptyField(&'static str),
}

/// Why a verification attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Header failed to parse or lacks a required field.
    MalformedRequest,

    /// Nonce was never issued, was invalidated, or has been swept.
    NonceNotFound,

    /// Nonce lifetime has elapsed.
    NonceExpired,

    /// Nonce count does not match the next expected counter value.
    ReplayOrOutOfOrder,

    /// Username is unknown to the credential lookup.
    UnknownUser,

    /// Request digest does not match the expected digest.
    ResponseMismatch,
}

impl FailureReason {
    /// Stable label used in logs, metrics and serialized results.
    ///
    /// # Examples
    ///
    /// ```
    /// # use composable_digest_auth::FailureReason;
    /// assert_eq!(FailureReason::ReplayOrOutOfOrder.as_str(), "replay_or_out_of_order");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedRequest => "malformed_request",
            Self::NonceNotFound => "nonce_not_found",
            Self::NonceExpired => "nonce_expired",
            Self::ReplayOrOutOfOrder => "replay_or_out_of_order",
            Self::UnknownUser => "unknown_user",
            Self::ResponseMismatch => "response_mismatch",
        }
    }

    /// Returns `true` if this failure suggests an attack rather than a stale client.
    ///
    /// # Examples
    ///
    /// ```
    /// # use composable_digest_auth::FailureReason;
    /// assert!(FailureReason::ReplayOrOutOfOrder.is_security_issue());
    /// assert!(!FailureReason::NonceExpired.is_security_issue());
    /// ```
    #[must_use]
    pub const fn is_security_issue(self) -> bool {
        matches!(self, Self::ReplayOrOutOfOrder | Self::ResponseMismatch)
    }

    /// Returns `true` if the verifier burns the nonce when failing for this reason.
    #[must_use]
    pub const fn invalidates_nonce(self) -> bool {
        matches!(
            self,
            Self::ReplayOrOutOfOrder | Self::UnknownUser | Self::ResponseMismatch
        )
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal digest authentication errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DigestAuthError {
    /// Message could not be parsed or constructed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// The configured hash function failed.
    #[error("Hash error: {0}")]
    Hash(#[from] HashError),

    /// Internal error (should not be exposed to clients).
    #[error("Internal error: {0}")]
    Internal(String),
}
