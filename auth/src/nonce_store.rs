//! Server-side nonce registry.
//!
//! Every issued challenge owns one record holding its expiry, its request
//! counter and a one-way invalidation flag.
//!
//! # Concurrency
//!
//! The table is a `RwLock` over a map of `Arc`-shared entries. Lookups take
//! the read lock only long enough to clone the `Arc`. The request counter
//! is a per-entry `AtomicU64`, so `increment_counter` is linearized per
//! nonce: two concurrent verifications of the same nonce always receive
//! different counter values, and at most one of them can match the `nc`
//! a replayed request carries.
//!
//! # Expiry
//!
//! Expiry is evaluated lazily at lookup time. Records are only physically
//! removed by [`NonceStore::sweep`], which runs when the table reaches its
//! capacity and, optionally, on a background interval via
//! [`NonceStore::spawn_sweeper`].
//!
//! # Capacity
//!
//! When the table is full, dead records are dropped first. If that frees
//! less than a tenth of the capacity, the oldest live records are evicted
//! in issue order until it does, so the full scan runs once per batch
//! rather than once per issue. Evicted live nonces are remembered in a
//! bounded tombstone list and report [`NonceStatus::Expired`], so clients
//! get a `stale=true` re-challenge instead of a password prompt.

use crate::challenge::ChallengeMessage;
use crate::constants::{
    fields, nonce_prefix, DEFAULT_MAX_LIVE_NONCES, DEFAULT_NONCE_LIFETIME_SECS,
};
use crate::error::{DigestAuthError, ParseError, Result};
use crate::metrics::{CHALLENGES_ISSUED, LIVE_NONCES, NONCES_EVICTED};
use crate::providers::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Snapshot of a nonce record.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NonceRecord {
    /// Nonce value (matches the challenge's `nonce`).
    pub value: String,

    /// Issue timestamp.
    pub created_at: DateTime<Utc>,

    /// Expiry timestamp; the record is dead from this instant on.
    pub expires_at: DateTime<Utc>,

    /// Number of verification attempts made against this nonce.
    pub request_counter: u64,

    /// Set once the nonce has been burned. Never reverts.
    pub invalidated: bool,
}

/// Liveness of a nonce at the time of the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonceStatus {
    /// Nonce is usable.
    Live(NonceRecord),

    /// Nonce lifetime has elapsed.
    Expired,

    /// Nonce was burned by a failed verification or an explicit release.
    Invalidated,

    /// Nonce was never issued or has been swept.
    Unknown,
}

#[derive(Debug)]
struct NonceEntry {
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    counter: AtomicU64,
    invalidated: AtomicBool,
}

impl NonceEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    fn is_dead(&self, now: DateTime<Utc>) -> bool {
        self.is_invalidated() || self.is_expired(now)
    }

    fn snapshot(&self, value: &str) -> NonceRecord {
        NonceRecord {
            value: value.to_string(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            request_counter: self.counter.load(Ordering::Acquire),
            invalidated: self.is_invalidated(),
        }
    }
}

#[derive(Debug, Default)]
struct NonceTable {
    entries: HashMap<String, Arc<NonceEntry>>,
    /// Nonce values in issue order. May still hold values already swept.
    issued: VecDeque<String>,
    /// Live nonces evicted for capacity, oldest first.
    evicted: VecDeque<String>,
    evicted_set: HashSet<String>,
}

impl NonceTable {
    fn retain_live(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_dead(now));
        let entries = &self.entries;
        self.issued.retain(|nonce| entries.contains_key(nonce));
        before - self.entries.len()
    }

    fn remember_evicted(&mut self, nonce: String, limit: usize) {
        while self.evicted.len() >= limit {
            match self.evicted.pop_front() {
                Some(old) => {
                    self.evicted_set.remove(&old);
                }
                None => break,
            }
        }
        self.evicted_set.insert(nonce.clone());
        self.evicted.push_back(nonce);
    }
}

/// Concurrent nonce registry.
///
/// Shared between request handlers behind an `Arc`; all methods take `&self`.
pub struct NonceStore {
    table: RwLock<NonceTable>,
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
    default_lifetime: Duration,
    max_live_nonces: usize,
}

impl NonceStore {
    /// Create a store using the system clock and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a store reading time from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: RwLock::new(NonceTable::default()),
            clock,
            sequence: AtomicU64::new(0),
            default_lifetime: Duration::seconds(DEFAULT_NONCE_LIFETIME_SECS),
            max_live_nonces: DEFAULT_MAX_LIVE_NONCES,
        }
    }

    /// Set the lifetime used when a caller passes a negative lifetime.
    #[must_use]
    pub const fn with_default_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = lifetime;
        self
    }

    /// Set the maximum number of records held before eviction kicks in.
    #[must_use]
    pub fn with_max_live_nonces(mut self, max: usize) -> Self {
        self.max_live_nonces = max.max(1);
        self
    }

    /// Issue a fresh nonce for `realm` and return it with its challenge.
    ///
    /// A negative `lifetime` falls back to the default lifetime; a zero
    /// lifetime produces a nonce that is already expired.
    ///
    /// # Errors
    ///
    /// Returns [`DigestAuthError::Parse`] if `realm` is empty and
    /// [`DigestAuthError::Internal`] if the table lock is poisoned.
    pub fn issue(&self, realm: &str, lifetime: Duration) -> Result<(String, ChallengeMessage)> {
        if realm.is_empty() {
            return Err(ParseError::EmptyField(fields::REALM).into());
        }

        let lifetime = if lifetime < Duration::zero() {
            self.default_lifetime
        } else {
            lifetime
        };
        let now = self.clock.now();
        let entry = Arc::new(NonceEntry {
            created_at: now,
            expires_at: now.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC),
            counter: AtomicU64::new(0),
            invalidated: AtomicBool::new(false),
        });

        let nonce = {
            let mut table = self.write()?;
            if table.entries.len() >= self.max_live_nonces {
                self.make_room(&mut table, now);
            }

            let nonce = loop {
                let candidate = self.generate_nonce(realm, now);
                if table.evicted_set.contains(&candidate) {
                    continue;
                }
                if let Entry::Vacant(slot) = table.entries.entry(candidate.clone()) {
                    slot.insert(Arc::clone(&entry));
                    break candidate;
                }
                tracing::warn!(realm = %realm, "Nonce collision, regenerating");
            };
            table.issued.push_back(nonce.clone());
            nonce
        };

        let challenge = ChallengeMessage::new(realm, nonce.clone())?;

        metrics::counter!(CHALLENGES_ISSUED).increment(1);
        tracing::debug!(
            realm = %realm,
            nonce = nonce_prefix(&nonce),
            lifetime_seconds = lifetime.num_seconds(),
            "Issued digest nonce"
        );

        Ok((nonce, challenge))
    }

    /// Return the record for `nonce` if it is live.
    ///
    /// # Errors
    ///
    /// Returns [`DigestAuthError::Internal`] if the table lock is poisoned.
    pub fn lookup(&self, nonce: &str) -> Result<Option<NonceRecord>> {
        match self.status(nonce)? {
            NonceStatus::Live(record) => Ok(Some(record)),
            NonceStatus::Expired | NonceStatus::Invalidated | NonceStatus::Unknown => Ok(None),
        }
    }

    /// Classify `nonce` as live, expired, invalidated or unknown.
    ///
    /// Nonces evicted for capacity while still live classify as expired.
    ///
    /// # Errors
    ///
    /// Returns [`DigestAuthError::Internal`] if the table lock is poisoned.
    pub fn status(&self, nonce: &str) -> Result<NonceStatus> {
        let entry = {
            let table = self.read()?;
            match table.entries.get(nonce) {
                Some(entry) => Arc::clone(entry),
                None if table.evicted_set.contains(nonce) => return Ok(NonceStatus::Expired),
                None => return Ok(NonceStatus::Unknown),
            }
        };

        if entry.is_invalidated() {
            Ok(NonceStatus::Invalidated)
        } else if entry.is_expired(self.clock.now()) {
            Ok(NonceStatus::Expired)
        } else {
            Ok(NonceStatus::Live(entry.snapshot(nonce)))
        }
    }

    /// Atomically bump the request counter of a live nonce.
    ///
    /// Returns the new counter value, or `None` if the nonce is not live.
    ///
    /// # Errors
    ///
    /// Returns [`DigestAuthError::Internal`] if the table lock is poisoned.
    pub fn increment_counter(&self, nonce: &str) -> Result<Option<u64>> {
        let Some(entry) = self.entry(nonce)? else {
            return Ok(None);
        };

        if entry.is_dead(self.clock.now()) {
            return Ok(None);
        }

        let count = entry.counter.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(nonce = nonce_prefix(nonce), count, "Nonce counter incremented");
        Ok(Some(count))
    }

    /// Burn `nonce` so no further verification can use it. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`DigestAuthError::Internal`] if the table lock is poisoned.
    pub fn invalidate(&self, nonce: &str) -> Result<()> {
        if let Some(entry) = self.entry(nonce)? {
            entry.invalidated.store(true, Ordering::Release);
            tracing::debug!(nonce = nonce_prefix(nonce), "Nonce invalidated");
        }
        Ok(())
    }

    /// Remove every expired or invalidated record.
    ///
    /// Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns [`DigestAuthError::Internal`] if the table lock is poisoned.
    pub fn sweep(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut table = self.write()?;
        let removed = table.retain_live(now);
        let remaining = table.entries.len();

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(LIVE_NONCES).set(remaining as f64);
        if removed > 0 {
            metrics::counter!(NONCES_EVICTED).increment(removed as u64);
            tracing::info!(removed, remaining, "Swept dead nonces");
        }

        Ok(removed)
    }

    /// Number of records currently held, live or not.
    ///
    /// # Errors
    ///
    /// Returns [`DigestAuthError::Internal`] if the table lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.entries.len())
    }

    /// Returns `true` if no records are held.
    ///
    /// # Errors
    ///
    /// Returns [`DigestAuthError::Internal`] if the table lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.entries.is_empty())
    }

    /// Run [`sweep`](Self::sweep) every `interval` on the current Tokio runtime.
    ///
    /// The task runs until the returned handle is aborted.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = store.sweep() {
                    tracing::error!(error = %e, "Nonce sweep failed");
                }
            }
        })
    }

    fn entry(&self, nonce: &str) -> Result<Option<Arc<NonceEntry>>> {
        Ok(self.read()?.entries.get(nonce).cloned())
    }

    /// Frees at least one eviction batch: dead records first, then the
    /// oldest live ones, which are tombstoned as expired.
    fn make_room(&self, table: &mut NonceTable, now: DateTime<Utc>) {
        let target = self.max_live_nonces - self.eviction_batch();

        let swept = table.retain_live(now);
        if swept > 0 {
            metrics::counter!(NONCES_EVICTED).increment(swept as u64);
            tracing::debug!(swept, "Nonce table full, dropped dead records");
        }
        if table.entries.len() <= target {
            return;
        }

        let mut evicted = 0_usize;
        while table.entries.len() > target {
            let Some(nonce) = table.issued.pop_front() else {
                break;
            };
            if let Some(entry) = table.entries.remove(&nonce) {
                evicted += 1;
                if !entry.is_invalidated() {
                    table.remember_evicted(nonce, self.max_live_nonces);
                }
            }
        }

        metrics::counter!(NONCES_EVICTED).increment(evicted as u64);
        tracing::warn!(
            evicted,
            capacity = self.max_live_nonces,
            "Nonce table full, evicted oldest live nonces"
        );
    }

    fn eviction_batch(&self) -> usize {
        (self.max_live_nonces / 10).clamp(1, self.max_live_nonces)
    }

    /// `sha256(realm:sequence:timestamp:salt)` as hex.
    fn generate_nonce(&self, realm: &str, now: DateTime<Utc>) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let salt: u64 = rand::random();
        let timestamp = now.timestamp_nanos_opt().unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(format!("{realm}:{sequence}:{timestamp}:{salt}").as_bytes());
        hex::encode(hasher.finalize())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, NonceTable>> {
        self.table
            .read()
            .map_err(|_| DigestAuthError::Internal("Nonce table lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, NonceTable>> {
        self.table
            .write()
            .map_err(|_| DigestAuthError::Internal("Nonce table lock poisoned".into()))
    }
}

impl Default for NonceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NonceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceStore")
            .field("default_lifetime", &self.default_lifetime)
            .field("max_live_nonces", &self.max_live_nonces)
            .finish_non_exhaustive()
    }
}
