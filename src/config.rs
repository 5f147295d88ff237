//! Bucket and store configuration.

use crate::error::ConfigError;
use crate::state_store::KEY_SEPARATOR;
use std::time::Duration;

/// Milliseconds per minute; leak rates are configured per minute and applied per millisecond.
pub const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Default lifetime of a stored bucket state after its last write.
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(60 * 60);

/// Default bound on a single store round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(1);

/// Validated, immutable configuration for one bucket.
///
/// One config is registered per protected resource; every client of that
/// resource gets its own state under the same config.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketConfig {
    name: String,
    capacity: u32,
    leak_rate_per_minute: u32,
    leak_rate_per_ms: f64,
}

impl BucketConfig {
    /// Create a config for bucket `name` holding up to `capacity` drops and
    /// leaking `leak_rate_per_minute` drops per minute.
    ///
    /// # Errors
    /// Returns `Err` if the name is empty, contains control characters or
    /// `::`, or ends with `:`.
    pub fn new(
        name: impl Into<String>,
        capacity: u32,
        leak_rate_per_minute: u32,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigError::EmptyBucketName);
        }
        if name.chars().any(char::is_control) {
            return Err(ConfigError::InvalidBucketName(name));
        }
        // Keys are `leaky::{bucket}::{client}`; the bucket ends at the first `::`.
        if name.contains(KEY_SEPARATOR) || name.ends_with(':') {
            return Err(ConfigError::AmbiguousBucketName(name));
        }

        Ok(Self {
            name,
            capacity,
            leak_rate_per_minute,
            leak_rate_per_ms: f64::from(leak_rate_per_minute) / MILLIS_PER_MINUTE,
        })
    }

    /// Bucket identifier used in cache keys.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum drops the bucket can hold.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Leak rate as configured.
    pub fn leak_rate_per_minute(&self) -> u32 {
        self.leak_rate_per_minute
    }

    /// Drops regenerated per millisecond.
    pub fn leak_rate_per_ms(&self) -> f64 {
        self.leak_rate_per_ms
    }

    /// Whether the bucket ever regenerates. A non-leaking bucket only recovers
    /// when its stored state expires.
    pub fn leaks(&self) -> bool {
        self.leak_rate_per_minute > 0
    }

    /// Time needed for `units` drops to leak away, rounded up to whole milliseconds.
    ///
    /// `None` when the bucket never leaks.
    pub fn time_to_leak(&self, units: f64) -> Option<Duration> {
        if !self.leaks() {
            return None;
        }
        if units <= 0.0 {
            return Some(Duration::ZERO);
        }
        let millis = (units / self.leak_rate_per_ms).ceil();
        Some(Duration::from_millis(millis as u64))
    }
}

/// How bucket state is kept in the external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    ttl: Duration,
    timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { ttl: DEFAULT_STATE_TTL, timeout: DEFAULT_STORE_TIMEOUT }
    }
}

impl StoreOptions {
    /// Expiry applied to every state write.
    ///
    /// Should outlast a full drain cycle at the slowest configured rate; it is
    /// also the only way a non-leaking bucket refills.
    ///
    /// # Errors
    /// Returns `Err` if `ttl` is zero.
    pub fn with_ttl(mut self, ttl: Duration) -> Result<Self, ConfigError> {
        if ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        self.ttl = ttl;
        Ok(self)
    }

    /// Upper bound on each get/set; a timed-out read fails open.
    ///
    /// # Errors
    /// Returns `Err` if `timeout` is zero.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.timeout = timeout;
        Ok(self)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
