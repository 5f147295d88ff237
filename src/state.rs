//! Per-client bucket state and the pure functions that move it through time.
//!
//! A bucket has no explicit state machine: its level is a function of the last
//! recorded write and the time since. [`BucketState::refresh`] applies the leak
//! and [`BucketState::drain`] records consumption; neither touches the store, so
//! both are exercised here without any I/O or real delays.

use crate::config::BucketConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remaining capacity of one (bucket, client) pair at a point in time.
///
/// Serialized as `{"last_update": "<rfc3339>", "space_remaining": <number>}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketState {
    /// Time of the last recorded write.
    pub last_update: DateTime<Utc>,
    /// Drops that still fit. Always within `0..=capacity`.
    pub space_remaining: f64,
}

impl BucketState {
    /// State for a client never seen before (or whose state could not be read).
    pub fn fresh(capacity: u32, now: DateTime<Utc>) -> Self {
        Self { last_update: now, space_remaining: f64::from(capacity) }
    }

    /// Apply the leak accumulated between `last_update` and `now`.
    ///
    /// Regeneration is continuous but floored to whole drops and clamped to the
    /// configured capacity. A `now` earlier than `last_update` (clock skew
    /// between instances) leaks nothing.
    pub fn refresh(&self, config: &BucketConfig, now: DateTime<Utc>) -> Self {
        let elapsed_ms = (now - self.last_update).num_milliseconds().max(0) as f64;
        let leaked = (self.space_remaining + elapsed_ms * config.leak_rate_per_ms()).floor();
        Self {
            last_update: now,
            space_remaining: leaked.clamp(0.0, f64::from(config.capacity())),
        }
    }

    /// Whether `count` drops fit.
    pub fn has_space_for(&self, count: u32) -> bool {
        self.space_remaining >= f64::from(count)
    }

    /// Record `count` drops at `now`. Callers check [`has_space_for`](Self::has_space_for) first.
    pub fn drain(&self, count: u32, now: DateTime<Utc>) -> Self {
        Self {
            last_update: now,
            space_remaining: (self.space_remaining - f64::from(count)).max(0.0),
        }
    }

    /// Whole drops remaining, for reporting.
    pub fn remaining(&self) -> u32 {
        self.space_remaining.max(0.0).min(f64::from(u32::MAX)) as u32
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
