//! Transfer engine: download and upload throughput measurement
//!
//! Every phase walks its catalog in order. For each server an ordered list
//! of strategies is tried until one yields a usable sample. The phase runs
//! under one time cap that fallbacks keep spending from; each strategy
//! attempt owns its own accumulator. Nothing runs concurrently.

pub mod budget;
pub mod download;
pub mod rate;
pub mod upload;

#[cfg(test)]
mod integration_tests;

pub use budget::TimeCap;
pub use download::DownloadEngine;
pub use rate::Accumulator;
pub use upload::UploadEngine;

use crate::{
    models::SpeedSample,
    types::{Outcome, TransferStrategy, UNKNOWN},
};
use std::time::Duration;

/// Which measurement a progress callback belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Latency,
    Download,
    Upload,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Latency => "latency",
            Phase::Download => "download",
            Phase::Upload => "upload",
        }
    }
}

/// Advisory progress callbacks; never needed for a correct result
pub trait ProgressObserver: Send + Sync {
    /// One latency probe finished
    fn on_probe(&self, _index: u32, _elapsed: Duration, _running_loss_pct: f64) {}

    /// One transfer chunk finished
    fn on_chunk(&self, _phase: Phase, _index: usize, _total: usize, _bytes: u64, _elapsed: Duration) {}

    /// The engine moved to another server or strategy
    fn on_attempt(&self, _phase: Phase, _server: &str, _strategy: TransferStrategy) {}
}

/// Observer that ignores everything
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Terminal state of one strategy attempt against one server
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(SpeedSample),
    PartialFailure(SpeedSample),
    Failed(String),
}

impl AttemptOutcome {
    /// Classify a sample by its outcome tag
    pub fn from_sample(sample: SpeedSample) -> Self {
        match sample.outcome {
            Outcome::Success => Self::Success(sample),
            Outcome::PartialFailure => Self::PartialFailure(sample),
            Outcome::Failed => Self::Failed(format!("no bytes transferred from {}", sample.server)),
        }
    }

    /// The sample if this attempt produced a usable measurement
    pub fn into_sample(self) -> Option<SpeedSample> {
        match self {
            Self::Success(sample) | Self::PartialFailure(sample) => Some(sample),
            Self::Failed(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::PartialFailure(_) => "partial",
            Self::Failed(_) => "failed",
        }
    }
}

/// One line of a phase's attempt history
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub server: String,
    pub url: String,
    pub strategy: TransferStrategy,
    pub result: String,
}

/// Result of a whole download or upload phase
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseReport {
    pub sample: SpeedSample,
    /// Display name of the server that produced the sample, or the last one tried
    pub server: String,
    pub attempts: Vec<AttemptRecord>,
}

impl PhaseReport {
    pub fn succeeded(server: &str, sample: SpeedSample, attempts: Vec<AttemptRecord>) -> Self {
        Self { sample, server: server.to_string(), attempts }
    }

    /// Every server and strategy was exhausted
    pub fn exhausted(last_server: Option<&str>, last_url: Option<&str>, attempts: Vec<AttemptRecord>) -> Self {
        Self {
            sample: SpeedSample::failed(last_url.unwrap_or(UNKNOWN)),
            server: last_server.unwrap_or(UNKNOWN).to_string(),
            attempts,
        }
    }

    /// `(SpeedSample, server)` pair consumed by the aggregator
    pub fn into_pair(self) -> (SpeedSample, String) {
        (self.sample, self.server)
    }
}

/// Finalize an accumulator into a tagged outcome
pub(crate) fn finalize(
    acc: &Accumulator,
    url: &str,
    strategy: TransferStrategy,
    complete: bool,
    time_capped: bool,
) -> AttemptOutcome {
    if acc.is_empty() {
        return AttemptOutcome::Failed(if time_capped {
            format!("time cap reached before any bytes moved on {}", url)
        } else {
            format!("no bytes transferred from {}", url)
        });
    }

    let outcome = if complete { Outcome::Success } else { Outcome::PartialFailure };
    let sample = SpeedSample::measured(acc.bytes(), acc.elapsed().as_secs_f64(), url, outcome, strategy)
        .with_time_capped(time_capped);
    AttemptOutcome::from_sample(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_complete_is_success() {
        let mut acc = Accumulator::new();
        acc.record(10_485_760, Duration::from_secs(2));
        let outcome = finalize(&acc, "http://a/", TransferStrategy::RangedChunked, true, false);
        let sample = outcome.clone().into_sample().unwrap();
        assert_eq!(outcome.label(), "success");
        assert!((sample.mbytes_per_sec - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_finalize_capped_is_partial() {
        let mut acc = Accumulator::new();
        acc.record(4_000, Duration::from_millis(500));
        let outcome = finalize(&acc, "http://a/", TransferStrategy::RangedChunked, false, true);
        match outcome {
            AttemptOutcome::PartialFailure(sample) => {
                assert!(sample.time_capped);
                assert_eq!(sample.bytes, 4_000);
            }
            other => panic!("expected partial, got {:?}", other),
        }
    }

    #[test]
    fn test_finalize_empty_is_failed() {
        let acc = Accumulator::new();
        let outcome = finalize(&acc, "http://a/", TransferStrategy::FullFetch, true, false);
        assert!(matches!(outcome, AttemptOutcome::Failed(_)));
        assert!(outcome.into_sample().is_none());
    }

    #[test]
    fn test_exhausted_report_names_last_server() {
        let report = PhaseReport::exhausted(Some("Tele2"), Some("http://tele2/10MB.zip"), Vec::new());
        let (sample, server) = report.into_pair();
        assert_eq!(server, "Tele2");
        assert_eq!(sample.server, "http://tele2/10MB.zip");
        assert_eq!(sample.outcome, Outcome::Failed);
        assert_eq!(sample.mbits_per_sec, 0.0);
    }

    #[test]
    fn test_exhausted_report_without_attempts_is_unknown() {
        let report = PhaseReport::exhausted(None, None, Vec::new());
        assert_eq!(report.server, UNKNOWN);
        assert_eq!(report.sample.server, UNKNOWN);
    }
}
