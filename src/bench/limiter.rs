//! Operations-per-second admission control.

use std::num::NonZeroU32;

use anyhow::{Context, Result};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as DirectLimiter};

/// Caps the long-run rate of admitted callers at the configured
/// operations/second. Safe for concurrent `acquire` calls; admission is
/// spaced at one permit per period (no burst), so `n` admissions take at
/// least `(n - 1) / qps` seconds of wall clock.
pub struct RateLimiter {
    inner: DirectLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RateLimiter {
    /// Creates a limiter admitting at most `qps` operations per second.
    pub fn new(qps: u32) -> Result<Self> {
        let qps = NonZeroU32::new(qps).context("qps must be positive")?;
        let quota = Quota::per_second(qps).allow_burst(NonZeroU32::MIN);
        Ok(Self { inner: DirectLimiter::direct(quota) })
    }

    /// Waits until the caller is admitted.
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }
}
