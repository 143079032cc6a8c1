//! Measurement samples and the aggregated test result

use crate::engine::rate::{effective_seconds, megabits_per_second, megabytes_per_second};
use crate::types::{Outcome, TransferStrategy, UNKNOWN};
use serde::{Deserialize, Serialize};

/// Outcome of one latency test invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    /// Host or address that was probed
    pub target: String,
    /// Probes issued (the liveness check is not counted)
    pub sent: u32,
    /// Probes that returned
    pub received: u32,
    /// Loss percentage in [0, 100]
    pub loss_pct: f64,
    /// Mean round-trip time in milliseconds
    pub avg_ms: f64,
    /// Population standard deviation of the round-trip times in milliseconds
    pub jitter_ms: f64,
    /// False when the liveness check failed and the series was skipped
    pub reachable: bool,
}

impl LatencySample {
    /// Derive loss, mean and jitter from individually recorded RTTs
    ///
    /// Only called once the liveness check passed, so the target stays
    /// reachable even when every counted probe is lost.
    pub fn from_rtts(target: &str, sent: u32, rtts_ms: &[f64]) -> Self {
        let received = (rtts_ms.len() as u32).min(sent);
        let (avg_ms, jitter_ms) = mean_and_jitter(rtts_ms);

        Self {
            target: target.to_string(),
            sent,
            received,
            loss_pct: loss_percent(sent, received),
            avg_ms,
            jitter_ms,
            reachable: true,
        }
    }

    /// Sample for a target whose liveness check failed outright
    pub fn unreachable(target: &str, sent: u32) -> Self {
        Self {
            target: target.to_string(),
            sent,
            received: 0,
            loss_pct: 100.0,
            avg_ms: 0.0,
            jitter_ms: 0.0,
            reachable: false,
        }
    }
}

/// Loss as (sent - received) / sent * 100, clamped to [0, 100]
pub fn loss_percent(sent: u32, received: u32) -> f64 {
    if sent == 0 {
        return 100.0;
    }
    let lost = sent.saturating_sub(received);
    (lost as f64 / sent as f64 * 100.0).clamp(0.0, 100.0)
}

/// Mean and population standard deviation; both zero for an empty set
pub fn mean_and_jitter(values: &[f64]) -> (f64, f64) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return (0.0, 0.0);
    }

    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    if finite.len() < 2 {
        return (mean, 0.0);
    }

    let variance = finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Outcome of one completed or abandoned transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedSample {
    /// Payload bytes moved
    pub bytes: u64,
    /// Elapsed seconds, floored to epsilon
    pub seconds: f64,
    /// Megabytes per second
    pub mbytes_per_sec: f64,
    /// Megabits per second
    pub mbits_per_sec: f64,
    /// Concrete URL the bytes came from or went to
    pub server: String,
    pub outcome: Outcome,
    pub strategy: TransferStrategy,
    /// Set when the time cap stopped the attempt early
    pub time_capped: bool,
}

impl SpeedSample {
    /// Build a sample from measured bytes and wall time
    ///
    /// Zero bytes always classify as `Failed`, whatever the caller asked for.
    pub fn measured(
        bytes: u64,
        elapsed_secs: f64,
        server: &str,
        outcome: Outcome,
        strategy: TransferStrategy,
    ) -> Self {
        let seconds = effective_seconds(elapsed_secs);
        let mbytes_per_sec = megabytes_per_second(bytes, seconds);
        let outcome = if bytes == 0 { Outcome::Failed } else { outcome };

        Self {
            bytes,
            seconds,
            mbytes_per_sec,
            mbits_per_sec: megabits_per_second(mbytes_per_sec),
            server: non_blank(server),
            outcome,
            strategy,
            time_capped: false,
        }
    }

    /// Zeroed sample naming the last server that was tried
    pub fn failed(server: &str) -> Self {
        Self::measured(0, 0.0, server, Outcome::Failed, TransferStrategy::None)
    }

    pub fn with_time_capped(mut self, capped: bool) -> Self {
        self.time_capped = capped;
        self
    }
}

/// Transfer figures for one phase as presented to consumers
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseFigures {
    /// Display name of the server the figures belong to
    pub server: String,
    pub sample: SpeedSample,
}

/// Immutable, sanitized record of one run
///
/// Only the aggregator builds this; every text field is non-blank and every
/// number finite and non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    latency: LatencySample,
    download: PhaseFigures,
    upload: PhaseFigures,
}

impl TestResult {
    pub(crate) fn new(latency: LatencySample, download: PhaseFigures, upload: PhaseFigures) -> Self {
        Self { latency, download, upload }
    }

    pub fn latency(&self) -> &LatencySample {
        &self.latency
    }

    pub fn download(&self) -> &PhaseFigures {
        &self.download
    }

    pub fn upload(&self) -> &PhaseFigures {
        &self.upload
    }
}

pub(crate) fn non_blank(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_all_probes_lost() {
        let sample = LatencySample::from_rtts("1.1.1.1", 10, &[]);
        assert_eq!(sample.loss_pct, 100.0);
        assert_eq!(sample.avg_ms, 0.0);
        assert_eq!(sample.jitter_ms, 0.0);
        assert!(sample.reachable);
    }

    #[test]
    fn test_mean_and_population_jitter() {
        let (mean, jitter) = mean_and_jitter(&[10.0, 20.0, 30.0, 40.0]);
        assert!((mean - 25.0).abs() < 1e-9);
        // sqrt((225 + 25 + 25 + 225) / 4)
        assert!((jitter - 125.0f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_single_rtt_has_no_jitter() {
        let sample = LatencySample::from_rtts("host", 4, &[12.5]);
        assert_eq!(sample.received, 1);
        assert_eq!(sample.loss_pct, 75.0);
        assert_eq!(sample.avg_ms, 12.5);
        assert_eq!(sample.jitter_ms, 0.0);
    }

    #[test]
    fn test_unreachable_sample() {
        let sample = LatencySample::unreachable("10.255.255.1", 10);
        assert_eq!(sample.sent, 10);
        assert_eq!(sample.loss_pct, 100.0);
        assert!(!sample.reachable);
    }

    #[test]
    fn test_zero_sent_counts_as_total_loss() {
        assert_eq!(loss_percent(0, 0), 100.0);
    }

    #[test]
    fn test_speed_sample_scenario_a() {
        let sample = SpeedSample::measured(10_485_760, 2.0, "s", Outcome::Success, TransferStrategy::RangedChunked);
        assert!((sample.mbytes_per_sec - 5.0).abs() < 1e-9);
        assert!((sample.mbits_per_sec - 40.0).abs() < 1e-9);
        assert_eq!(sample.outcome, Outcome::Success);
    }

    #[test]
    fn test_zero_bytes_is_failed_and_keeps_server() {
        let sample = SpeedSample::measured(0, 5.0, "http://tele2/10MB.zip", Outcome::Success, TransferStrategy::FullFetch);
        assert_eq!(sample.outcome, Outcome::Failed);
        assert_eq!(sample.mbytes_per_sec, 0.0);
        assert_eq!(sample.server, "http://tele2/10MB.zip");
    }

    #[test]
    fn test_blank_server_becomes_unknown() {
        assert_eq!(SpeedSample::failed("  ").server, UNKNOWN);
    }

    proptest! {
        #[test]
        fn prop_loss_stays_in_bounds(sent in 0u32..1000, received in 0u32..2000) {
            let loss = loss_percent(sent, received);
            prop_assert!((0.0..=100.0).contains(&loss));
        }

        #[test]
        fn prop_jitter_non_negative(values in proptest::collection::vec(0.0f64..5000.0, 0..50)) {
            let (mean, jitter) = mean_and_jitter(&values);
            prop_assert!(mean >= 0.0);
            prop_assert!(jitter >= 0.0);
        }
    }
}
