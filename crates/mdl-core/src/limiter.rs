//! Shared bandwidth budget for all workers.
//!
//! A token bucket holding up to `burst` bytes, refilled at `rate` bytes per
//! second. Callers reserve bytes under a short lock; when the bucket runs dry
//! the balance goes negative and each caller sleeps (outside the lock) until
//! its own reservation is covered. Reservations are granted in lock order, so
//! every caller eventually proceeds and aggregate throughput stays within
//! `rate` plus one burst.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Token-bucket rate limiter shared by every transfer (wrap in `Arc`).
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    /// Available bytes; negative when callers have reserved ahead of the refill.
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Creates a limiter with `rate_bytes_per_sec` refill and `burst_bytes` capacity.
    /// The bucket starts full. Both values are clamped to at least 1.
    pub fn new(rate_bytes_per_sec: u64, burst_bytes: u64) -> Self {
        let burst = burst_bytes.max(1) as f64;
        Self {
            rate: rate_bytes_per_sec.max(1) as f64,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Limiter whose burst is one second's worth of `rate_bytes_per_sec`.
    pub fn from_rate(rate_bytes_per_sec: u64) -> Self {
        Self::new(rate_bytes_per_sec, rate_bytes_per_sec)
    }

    /// Limiter for a cap given in bytes per second; `None` when the cap is 0 (unlimited).
    pub fn for_cap(cap_bytes_per_sec: u64) -> Option<Self> {
        (cap_bytes_per_sec > 0).then(|| Self::from_rate(cap_bytes_per_sec))
    }

    /// Limiter for a cap given in KiB/s; `None` when `kib` is 0 (unlimited).
    pub fn from_kib_per_sec(kib: u64) -> Option<Self> {
        Self::for_cap(kib.saturating_mul(1024))
    }

    pub fn rate_bytes_per_sec(&self) -> u64 {
        self.rate as u64
    }

    pub fn burst_bytes(&self) -> u64 {
        self.burst as u64
    }

    /// Blocks until `n` bytes of budget are available, then consumes them.
    /// Never fails; `n` larger than the burst simply waits longer.
    pub fn consume(&self, n: usize) {
        let wait = self.reserve(n as u64, Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }

    /// Takes `n` tokens as of `now` and returns how long the caller must wait
    /// before the reservation is covered.
    fn reserve(&self, n: u64, now: Instant) -> Duration {
        if n == 0 {
            return Duration::ZERO;
        }
        let mut bucket = match self.bucket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst);
        bucket.last_refill = bucket.last_refill.max(now);
        bucket.tokens -= n as f64;
        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-bucket.tokens / self.rate)
        }
    }
}
