//! Mock provider implementations for testing.
//!
//! This module provides simple, in-memory implementations of all provider traits
//! for use in unit and integration tests.

pub mod clock;
pub mod credentials;
pub mod hasher;

pub use clock::ManualClock;
pub use credentials::MockCredentialStore;
pub use hasher::FailingHasher;
