#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # leaky
//!
//! Per-client leaky-bucket rate limiting for tower HTTP services, with state
//! kept in a shared cache so several instances enforce one limit.
//!
//! ## Features
//!
//! - **Leaky buckets** with a burst capacity and a per-minute leak rate
//! - **Shared state** behind a small get/set-with-TTL [`StateStore`] trait
//! - **Fail-open** reads: a store outage admits traffic instead of blocking it
//! - **Tower middleware** answering `429 Too Many Requests` for throttled clients
//! - **Injectable clock** for deterministic tests
//!
//! ## Quick Start
//!
//! ```rust
//! use leaky::{InMemoryStore, ThrottleManager};
//! use http::{Request, Response};
//! use tower::{service_fn, ServiceExt};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = ThrottleManager::new(InMemoryStore::new());
//!
//!     let endpoint = service_fn(|_req: Request<String>| async {
//!         Ok::<_, std::convert::Infallible>(Response::new(String::from("ok")))
//!     });
//!
//!     // 10 requests in a burst, then one more every 6 seconds, per remote address.
//!     let api = manager
//!         .throttling_handler(
//!             endpoint,
//!             10,
//!             10,
//!             |req: &Request<String>| {
//!                 req.headers()
//!                     .get("x-forwarded-for")
//!                     .and_then(|v| v.to_str().ok())
//!                     .unwrap_or("unknown")
//!                     .to_string()
//!             },
//!             "/api",
//!         )
//!         .expect("valid bucket name");
//!
//!     let res = api.oneshot(Request::new(String::new())).await.unwrap();
//!     assert_eq!(res.status(), 200);
//! }
//! ```

pub mod bucket;
pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod middleware;
pub mod prelude;
pub mod rate_limit;
pub mod state;
pub mod state_store;
pub mod store;

// Re-exports
pub use bucket::LeakyBucket;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BucketConfig, StoreOptions, DEFAULT_STATE_TTL, DEFAULT_STORE_TIMEOUT};
pub use error::{ConfigError, StoreError};
pub use manager::ThrottleManager;
pub use middleware::{Throttle, ThrottleLayer, RATE_LIMIT_EXCEEDED};
pub use rate_limit::{Decision, RateLimiter};
pub use state::BucketState;
pub use state_store::{BucketStateStore, Fetch, Loaded};
pub use store::{InMemoryStore, StateStore};
