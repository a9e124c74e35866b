//! Time source for nonce expiry.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Clock abstraction.
///
/// The nonce store never reads the system time directly, so expiry can be
/// tested deterministically.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock.
///
/// Reads the wall clock once at construction and advances by the
/// monotonic [`Instant`] from there, so stepping the system time (NTP,
/// manual changes) neither extends nor shortens nonce lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    wall: DateTime<Utc>,
    anchor: Instant,
}

impl SystemClock {
    /// Anchor a new clock at the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            wall: Utc::now(),
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.anchor.elapsed())
            .ok()
            .and_then(|elapsed| self.wall.checked_add_signed(elapsed))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
