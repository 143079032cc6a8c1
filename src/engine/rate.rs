//! Throughput arithmetic and the per-attempt byte/time accumulator

use crate::defaults::{BYTES_PER_MB, ELAPSED_EPSILON};
use serde::Serialize;
use std::time::Duration;

/// Elapsed seconds floored to epsilon so rates never divide by zero
pub fn effective_seconds(elapsed: f64) -> f64 {
    if elapsed.is_finite() && elapsed >= ELAPSED_EPSILON {
        elapsed
    } else {
        ELAPSED_EPSILON
    }
}

/// Megabytes (1 MB = 1,048,576 bytes) per second
pub fn megabytes_per_second(bytes: u64, elapsed: f64) -> f64 {
    (bytes as f64 / BYTES_PER_MB as f64) / effective_seconds(elapsed)
}

/// Megabits per second derived from megabytes per second
pub fn megabits_per_second(mbytes_per_sec: f64) -> f64 {
    mbytes_per_sec * 8.0
}

/// One completed chunk of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChunkRecord {
    pub bytes: u64,
    pub seconds: f64,
}

/// Running byte/time totals for exactly one transfer attempt
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    chunks: Vec<ChunkRecord>,
    bytes: u64,
    elapsed: Duration,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one chunk's payload bytes and wall time
    pub fn record(&mut self, bytes: u64, elapsed: Duration) {
        self.bytes += bytes;
        self.elapsed += elapsed;
        self.chunks.push(ChunkRecord { bytes, seconds: elapsed.as_secs_f64() });
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn chunks(&self) -> &[ChunkRecord] {
        &self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }
}
