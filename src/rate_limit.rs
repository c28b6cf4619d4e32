// Copyright 2025 Saorsa Labs Limited
//
// Dual-licensed under AGPL-3.0-or-later and a commercial license.

//! Token-bucket gate on batch dispatch frequency.
//!
//! One token is consumed per batch dispatch, not per identifier. The
//! single collector task backs off and retries on failure, so at most one
//! batch ever waits on the bucket.

use parking_lot::Mutex;
use std::time::Instant;

/// Token-bucket parameters.
#[derive(Debug, Clone, Copy)]
pub struct RateConfig {
    /// Maximum tokens the bucket holds (burst allowance).
    pub capacity: u32,
    /// Tokens replenished per second.
    pub refill_per_second: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            refill_per_second: 5.0,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Auto-replenishing token bucket. Starts full.
#[derive(Debug)]
pub struct TokenBucket {
    config: RateConfig,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket with the given parameters.
    pub fn new(config: RateConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BucketState {
                tokens: f64::from(config.capacity),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.config.refill_per_second)
            .min(f64::from(self.config.capacity));
        state.last_refill = now;
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available (refilled to `now`), for diagnostics.
    pub fn available(&self) -> f64 {
        let now = Instant::now();
        let mut state = self.state.lock();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.config.refill_per_second)
            .min(f64::from(self.config.capacity));
        state.last_refill = now;
        state.tokens
    }

    #[cfg(test)]
    fn advance_clock(&self, advance: std::time::Duration) -> Instant {
        // Rewind the refill clock so tests can model elapsed time without
        // sleeping.
        let mut state = self.state.lock();
        state.last_refill -= advance;
        state.last_refill + advance
    }
}
