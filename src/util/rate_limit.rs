//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Hot-path diagnostics (dropped packets, oversized snapshots)
pub const DIAGNOSTIC_LOG_RATE_LIMIT: u32 = 5; // Max 5 log lines per second per gate

/// Lets a log line through at most N times per second and counts the rest
#[derive(Clone)]
pub struct LogGate {
    limiter: Arc<Limiter>,
    suppressed: Arc<AtomicU64>,
}

impl LogGate {
    pub fn new(per_second: u32) -> Self {
        Self {
            limiter: create_limiter(per_second),
            suppressed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Check if a log line is allowed (returns true if allowed)
    pub fn allow(&self) -> bool {
        let allowed = self.limiter.check().is_ok();
        if !allowed {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
        }
        allowed
    }

    /// Lines suppressed so far
    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }
}

impl Default for LogGate {
    fn default() -> Self {
        Self::new(DIAGNOSTIC_LOG_RATE_LIMIT)
    }
}
