//! Token bucket for a single client.

use std::time::Instant;

/// Token bucket state. Refill is driven entirely by elapsed wall time:
/// `floor(elapsed_seconds * rate)` whole tokens are added, capped at
/// capacity, and `last_refilled` only advances when at least one whole
/// token was granted so fractional intervals accumulate across calls.
#[derive(Debug)]
pub struct Bucket {
    capacity: u64,
    tokens: u64,
    refill_rate: u64,
    last_refilled: Instant,
}

impl Bucket {
    /// A new bucket starts full.
    pub fn new(capacity: u64, refill_rate: u64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_rate,
            last_refilled: Instant::now(),
        }
    }

    /// Refill by elapsed time, then try to consume one token.
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&mut self, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_refilled).as_secs_f64();
        let added = (elapsed * self.refill_rate as f64) as u64;

        if added > 0 {
            self.tokens = (self.tokens + added).min(self.capacity);
            self.last_refilled = now;
        }

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Whether the bucket has refilled back to capacity, counting tokens
    /// earned since the last refill. Refill is otherwise applied lazily on
    /// `allow`, so a quiet bucket's stored count lags wall time.
    pub fn is_full(&self) -> bool {
        self.is_full_at(Instant::now())
    }

    fn is_full_at(&self, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_refilled).as_secs_f64();
        let added = (elapsed * self.refill_rate as f64) as u64;
        self.tokens.saturating_add(added) >= self.capacity
    }

    pub(crate) fn capacity(&self) -> u64 {
        self.capacity
    }

    pub(crate) fn refill_rate(&self) -> u64 {
        self.refill_rate
    }
}
