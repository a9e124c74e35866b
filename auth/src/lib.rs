//! # Composable Rust Digest Authentication
//!
//! HTTP Digest authentication (RFC 2617, with RFC 7616 algorithm
//! agility) as a synchronous, in-memory engine that any HTTP layer can
//! call from many request threads at once.
//!
//! ## Features
//!
//! - **Replay-resistant**: every nonce carries a strictly increasing
//!   request counter; a repeated or skipped `nc` burns the nonce
//! - **Time-bounded**: nonces expire lazily and are swept in the background
//! - **Pluggable hashing**: MD5 for compatibility, SHA-256, or your own
//! - **Testable**: clock, credentials and hasher are injected traits
//!
//! ## Architecture
//!
//! ```text
//! issue:  DigestAuthenticator → NonceStore → ChallengeMessage → header::format → wire
//! verify: wire → header::parse → AuthorizationMessage → Verifier ↔ NonceStore
//!                                                        Verifier → CredentialLookup
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! let auth = DigestAuthenticator::new(DigestConfig::new("api"), users);
//!
//! // Unauthenticated request: respond 401 with this header
//! let www_authenticate = auth.issue_challenge("api", 300)?;
//!
//! // Retried request
//! let result = auth.verify("GET", authorization_header)?;
//! if !result.ok {
//!     let www_authenticate = auth.rechallenge("api", 300, &result)?;
//!     // respond 401 again
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod authenticator;
pub mod authorization;
pub mod challenge;
pub mod config;
pub mod constants;
pub mod error;
pub mod header;
pub mod metrics;
pub mod nonce_store;
pub mod providers;
pub mod verifier;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use authenticator::{AuthResult, DigestAuthenticator};
pub use authorization::AuthorizationMessage;
pub use challenge::ChallengeMessage;
pub use config::DigestConfig;
pub use error::{DigestAuthError, FailureReason, ParseError, Result};
pub use nonce_store::{NonceRecord, NonceStatus, NonceStore};
pub use verifier::{Verdict, Verifier};
