//! Shared holder for the most recent reading.

use super::data::Reading;
use std::sync::{PoisonError, RwLock};

/// Process-wide "last known reading".
///
/// Constructed once at startup and shared by `Arc` with the single writer
/// (sensor poller or remote fetcher) and every reader (displays, HTTP).
/// The lock is only held long enough to copy a `Reading`, so readers never
/// observe a half-written value and never hold up the writer for long.
#[derive(Debug, Default)]
pub struct ReadingStore {
    current: RwLock<Reading>,
}

impl ReadingStore {
    /// Create a store holding the never-captured reading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `reading`.
    pub fn with_reading(reading: Reading) -> Self {
        Self {
            current: RwLock::new(reading),
        }
    }

    /// Snapshot of the most recently stored reading.
    pub fn get(&self) -> Reading {
        // A panicking writer cannot leave a partial `Reading` behind.
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the stored reading.
    pub fn set(&self, reading: Reading) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = reading;
    }
}
