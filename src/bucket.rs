//! Leaky bucket admission logic.

use crate::clock::{Clock, SystemClock};
use crate::config::{BucketConfig, StoreOptions};
use crate::rate_limit::{Decision, RateLimiter};
use crate::state::BucketState;
use crate::state_store::{BucketStateStore, Loaded};
use crate::store::StateStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// A leaky bucket applied per client against a shared store.
///
/// Each client starts with `capacity` drops of space. Every admitted request
/// fills the bucket by its drop count, and the bucket leaks at the configured
/// rate. State is never cached in process: every check reads the store, so the
/// decision reflects the latest write from any instance.
///
/// # Concurrency
///
/// The read, decide and write steps are not atomic. Two concurrent requests
/// for the same client can both read the same state, both be admitted, and the
/// later write wins, losing one decrement. This approximation is accepted;
/// closing it needs a store-side compare-and-swap or scripted update.
#[derive(Debug)]
pub struct LeakyBucket<S> {
    config: BucketConfig,
    states: BucketStateStore<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for LeakyBucket<S> {
    fn clone(&self) -> Self {
        Self { config: self.config.clone(), states: self.states.clone(), clock: self.clock.clone() }
    }
}

impl<S> LeakyBucket<S>
where
    S: StateStore,
{
    /// Create a bucket using the system clock.
    pub fn new(config: BucketConfig, store: Arc<S>, options: StoreOptions) -> Self {
        Self::with_clock(config, store, options, Arc::new(SystemClock))
    }

    /// Create a bucket reading time from `clock`.
    pub fn with_clock(
        config: BucketConfig,
        store: Arc<S>,
        options: StoreOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let states = BucketStateStore::new(store, config.name(), options);
        Self { config, states, clock }
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    /// Typed access to this bucket's stored state.
    pub fn states(&self) -> &BucketStateStore<S> {
        &self.states
    }

    /// Current state for `client_key` with the leak applied. Nothing is written.
    ///
    /// A client with no usable stored state gets a full bucket stamped now.
    pub async fn refresh(&self, client_key: &str) -> BucketState {
        let now = self.clock.now();
        match self.states.get(client_key, self.config.capacity(), now).await {
            Loaded::Fresh(state) => state,
            Loaded::Stored(state) => state.refresh(&self.config, now),
        }
    }

    /// Whole drops `client_key` could add right now. Nothing is written.
    pub async fn remaining(&self, client_key: &str) -> u32 {
        self.refresh(client_key).await.remaining()
    }

    /// Try to add `count` drops for `client_key`.
    ///
    /// Admission writes the drained state back to the store. A denial writes
    /// nothing, so the next check still measures leak from the last admitted
    /// request.
    pub async fn acquire(&self, client_key: &str, count: u32) -> Decision {
        let current = self.refresh(client_key).await;

        if !current.has_space_for(count) {
            let retry_after = if count > self.config.capacity() {
                None
            } else {
                self.config.time_to_leak(f64::from(count) - current.space_remaining)
            };
            debug!(
                target: "leaky::bucket",
                bucket = %self.config.name(),
                count,
                remaining = current.remaining(),
                "bucket full; denying"
            );
            return Decision::Denied { retry_after };
        }

        let updated = current.drain(count, self.clock.now());
        self.states.set(client_key, &updated).await;
        debug!(
            target: "leaky::bucket",
            bucket = %self.config.name(),
            count,
            remaining = updated.remaining(),
            "admitted"
        );
        Decision::Allowed { remaining: updated.remaining() }
    }

    /// Add `count` drops for `client_key` if there is space.
    pub async fn add(&self, count: u32, client_key: &str) -> bool {
        self.acquire(client_key, count).await.is_allowed()
    }
}

#[async_trait]
impl<S> RateLimiter for LeakyBucket<S>
where
    S: StateStore + 'static,
{
    async fn acquire(&self, client_key: &str, drops: u32) -> Decision {
        LeakyBucket::acquire(self, client_key, drops).await
    }
}
