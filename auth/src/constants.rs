//! Digest authentication constants.
//!
//! Wire tokens and defaults shared by the codec, the nonce store and the
//! authenticator.

/// Authentication scheme token that prefixes every Digest header value.
pub const DIGEST_SCHEME: &str = "Digest";

/// Quality-of-protection token for plain authentication.
pub const QOP_AUTH: &str = "auth";

/// Default nonce lifetime in seconds.
pub const DEFAULT_NONCE_LIFETIME_SECS: i64 = 300;

/// Default upper bound on nonce records held in memory.
pub const DEFAULT_MAX_LIVE_NONCES: usize = 10_000;

/// Default interval between background nonce sweeps, in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Number of leading nonce characters written to logs.
pub const NONCE_LOG_PREFIX_LEN: usize = 8;

/// Header parameter names.
pub mod fields {
    /// `realm` parameter.
    pub const REALM: &str = "realm";

    /// `nonce` parameter.
    pub const NONCE: &str = "nonce";

    /// `domain` parameter (space separated URI prefixes).
    pub const DOMAIN: &str = "domain";

    /// `qop` parameter.
    pub const QOP: &str = "qop";

    /// `stale` parameter.
    pub const STALE: &str = "stale";

    /// `algorithm` parameter.
    pub const ALGORITHM: &str = "algorithm";

    /// `opaque` parameter.
    pub const OPAQUE: &str = "opaque";

    /// `username` parameter.
    pub const USERNAME: &str = "username";

    /// `uri` parameter (the digest-uri).
    pub const URI: &str = "uri";

    /// `cnonce` parameter (client nonce).
    pub const CNONCE: &str = "cnonce";

    /// `nc` parameter (nonce count).
    pub const NC: &str = "nc";

    /// `response` parameter (request digest).
    pub const RESPONSE: &str = "response";
}

/// Shortens a nonce for log output.
#[must_use]
pub fn nonce_prefix(nonce: &str) -> &str {
    let end = nonce
        .char_indices()
        .nth(NONCE_LOG_PREFIX_LEN)
        .map_or(nonce.len(), |(idx, _)| idx);
    &nonce[..end]
}
