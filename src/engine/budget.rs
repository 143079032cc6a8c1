//! Time-cap budget shared by every attempt of one phase

use std::time::{Duration, Instant};

/// Shortest timeout handed to any single request
pub const MIN_REQUEST_TIMEOUT: Duration = Duration::from_millis(50);

/// Wall-clock allowance for one transfer phase
///
/// The loop asks `exhausted()` before issuing each request and bounds every
/// request by `remaining()`, so a slow server cannot overrun the cap by more
/// than the request currently in flight.
#[derive(Debug, Clone, Copy)]
pub struct TimeCap {
    started: Instant,
    cap: Duration,
}

impl TimeCap {
    /// Start the clock now
    pub fn start(cap: Duration) -> Self {
        Self { started: Instant::now(), cap }
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.cap.saturating_sub(self.elapsed())
    }

    pub fn exhausted(&self) -> bool {
        self.elapsed() >= self.cap
    }

    /// Timeout for the next request: the remaining budget, never below the floor
    pub fn request_timeout(&self) -> Duration {
        self.remaining().max(MIN_REQUEST_TIMEOUT)
    }

    /// Like `request_timeout` but also bounded by a per-call ceiling
    pub fn request_timeout_within(&self, ceiling: Duration) -> Duration {
        self.request_timeout().min(ceiling.max(MIN_REQUEST_TIMEOUT))
    }
}
