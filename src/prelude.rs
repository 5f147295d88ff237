//! Convenient re-exports for common leaky types.
pub use crate::{
    bucket::LeakyBucket,
    config::{BucketConfig, StoreOptions},
    error::ConfigError,
    manager::ThrottleManager,
    middleware::{Throttle, ThrottleLayer},
    rate_limit::{Decision, RateLimiter},
    store::{InMemoryStore, StateStore},
};
