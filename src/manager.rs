//! Registration entry point tying buckets and middleware to one shared store.

use crate::bucket::LeakyBucket;
use crate::clock::{Clock, SystemClock};
use crate::config::{BucketConfig, StoreOptions};
use crate::error::ConfigError;
use crate::middleware::{Throttle, ThrottleLayer};
use crate::store::StateStore;
use std::fmt;
use std::sync::Arc;
use tower_layer::Layer;

/// Hands out leaky buckets that all keep their state in the same store.
///
/// One manager per store connection; one bucket per protected resource.
pub struct ThrottleManager<S> {
    store: Arc<S>,
    options: StoreOptions,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for ThrottleManager<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), options: self.options, clock: self.clock.clone() }
    }
}

impl<S> fmt::Debug for ThrottleManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleManager")
            .field("options", &self.options)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl<S> ThrottleManager<S>
where
    S: StateStore + 'static,
{
    /// Create a manager owning `store`.
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Create a manager over a store shared with other code.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self { store, options: StoreOptions::default(), clock: Arc::new(SystemClock) }
    }

    /// TTL and timeout applied to buckets created afterwards.
    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Time source for buckets created afterwards.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Create a bucket for direct use via [`LeakyBucket::add`].
    ///
    /// # Errors
    /// Returns `Err` if `bucket_name` is empty, contains control characters or
    /// `::`, or ends with `:`.
    pub fn bucket(
        &self,
        capacity: u32,
        leak_rate_per_minute: u32,
        bucket_name: impl Into<String>,
    ) -> Result<LeakyBucket<S>, ConfigError> {
        let config = BucketConfig::new(bucket_name, capacity, leak_rate_per_minute)?;
        Ok(LeakyBucket::with_clock(config, self.store.clone(), self.options, self.clock.clone()))
    }

    /// Create a throttling layer charging one drop per request to the client
    /// returned by `key_fn`.
    ///
    /// # Errors
    /// Returns `Err` if `bucket_name` is empty, contains control characters or
    /// `::`, or ends with `:`.
    pub fn layer<K>(
        &self,
        capacity: u32,
        leak_rate_per_minute: u32,
        key_fn: K,
        bucket_name: impl Into<String>,
    ) -> Result<ThrottleLayer<LeakyBucket<S>, K>, ConfigError> {
        let bucket = self.bucket(capacity, leak_rate_per_minute, bucket_name)?;
        Ok(ThrottleLayer::new(bucket, key_fn))
    }

    /// Wrap `handler` so that each client may make `capacity` requests in a
    /// burst, regaining `leak_rate_per_minute` requests per minute.
    ///
    /// # Errors
    /// Returns `Err` if `bucket_name` is empty, contains control characters or
    /// `::`, or ends with `:`.
    pub fn throttling_handler<H, K>(
        &self,
        handler: H,
        capacity: u32,
        leak_rate_per_minute: u32,
        key_fn: K,
        bucket_name: impl Into<String>,
    ) -> Result<Throttle<H, LeakyBucket<S>, K>, ConfigError> {
        Ok(self.layer(capacity, leak_rate_per_minute, key_fn, bucket_name)?.layer(handler))
    }
}
