//! Metric names for digest authentication.
//!
//! The engine records through the `metrics` facade. Without an installed
//! recorder every macro is a no-op, so applications opt in by installing
//! an exporter and calling [`describe_metrics`] once at startup.

use metrics::{describe_counter, describe_gauge};

/// Challenges issued.
pub const CHALLENGES_ISSUED: &str = "digest_auth_challenges_issued_total";

/// Verification attempts, labelled by `outcome`.
pub const VERIFICATIONS: &str = "digest_auth_verifications_total";

/// Nonce records removed by sweeps or capacity eviction.
pub const NONCES_EVICTED: &str = "digest_auth_nonces_evicted_total";

/// Nonce records held after the last sweep.
pub const LIVE_NONCES: &str = "digest_auth_live_nonces";

/// Outcome label for accepted verifications.
pub const OUTCOME_ACCEPTED: &str = "accepted";

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(CHALLENGES_ISSUED, "Number of Digest challenges issued");
    describe_counter!(
        VERIFICATIONS,
        "Number of Digest verification attempts by outcome"
    );
    describe_counter!(
        NONCES_EVICTED,
        "Number of nonce records removed by sweeps or capacity eviction"
    );
    describe_gauge!(LIVE_NONCES, "Number of nonce records held in memory");
}
