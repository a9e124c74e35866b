//! Digest authentication providers.
//!
//! Traits for everything the engine consumes from outside: the time
//! source, the credential store and the hash function. The authenticator
//! depends on these traits; production code plugs in real implementations
//! and tests plug in the mocks from [`crate::mocks`].
//!
//! ```text
//! ┌──────────────────────┐
//! │ DigestAuthenticator  │
//! └──────────┬───────────┘
//!            │ depends on
//!   ┌────────┼─────────────────┐
//!   ▼        ▼                 ▼
//! Clock  CredentialLookup  DigestHasher
//! ```

pub mod clock;
pub mod credentials;
pub mod hasher;

// Re-export provider traits
pub use clock::{Clock, SystemClock};
pub use credentials::{CredentialEntry, CredentialLookup};
pub use hasher::{DigestAlgorithm, DigestHasher, HashError, Md5Hasher, Sha256Hasher};
