//! Per-user request throttling for caption generation.

pub mod clock;
pub mod limiter;

pub use clock::{Clock, SystemClock};
pub use limiter::RateLimiter;

#[cfg(any(test, feature = "test-helpers"))]
pub use clock::MockClock;
