//! Result aggregation and the canonical JSON document
//!
//! The aggregator is the only place a [`TestResult`] is built. Everything it
//! emits is sanitized: text is never blank and numbers are finite and
//! non-negative. The JSON form has a fixed key order and fixed precision per
//! field, so formatting the same result twice gives identical bytes.

use crate::{
    error::Result,
    models::{metrics::non_blank, LatencySample, PhaseFigures, SpeedSample, TestResult},
    types::UNREACHABLE,
};
use serde::{Deserialize, Serialize};

/// Decimal places per JSON field
const LOSS_DECIMALS: usize = 1;
const MS_DECIMALS: usize = 2;
const MBYTES_DECIMALS: usize = 3;
const MBITS_DECIMALS: usize = 1;
const SECONDS_DECIMALS: usize = 2;

/// Latency block of the JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyReport {
    pub server: String,
    pub loss_pct: f64,
    pub avg_ms: f64,
    pub jitter_ms: f64,
}

/// Download or upload block of the JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReport {
    pub server: String,
    #[serde(rename = "MBps")]
    pub mbytes_per_sec: f64,
    #[serde(rename = "Mbps")]
    pub mbits_per_sec: f64,
    pub seconds: f64,
}

/// The exported document, numbers already rounded to their declared precision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonReport {
    pub latency: LatencyReport,
    pub download: TransferReport,
    pub upload: TransferReport,
}

impl JsonReport {
    /// Project a result onto the document, rounding every figure
    pub fn from_result(result: &TestResult) -> Self {
        let latency = result.latency();
        let server = if latency.reachable { latency.target.clone() } else { UNREACHABLE.to_string() };
        Self {
            latency: LatencyReport {
                server,
                loss_pct: round_to(latency.loss_pct, LOSS_DECIMALS),
                avg_ms: round_to(latency.avg_ms, MS_DECIMALS),
                jitter_ms: round_to(latency.jitter_ms, MS_DECIMALS),
            },
            download: TransferReport::from_figures(result.download()),
            upload: TransferReport::from_figures(result.upload()),
        }
    }

    /// Canonical text: fixed key order, fixed precision, no whitespace
    pub fn to_canonical_string(&self) -> String {
        format!(
            "{{\"latency\":{},\"download\":{},\"upload\":{}}}",
            self.latency.canonical(),
            self.download.canonical(),
            self.upload.canonical()
        )
    }
}

impl LatencyReport {
    fn canonical(&self) -> String {
        format!(
            "{{\"server\":{},\"loss_pct\":{:.*},\"avg_ms\":{:.*},\"jitter_ms\":{:.*}}}",
            quote(&self.server),
            LOSS_DECIMALS,
            clean(self.loss_pct),
            MS_DECIMALS,
            clean(self.avg_ms),
            MS_DECIMALS,
            clean(self.jitter_ms)
        )
    }
}

impl TransferReport {
    fn from_figures(figures: &PhaseFigures) -> Self {
        Self {
            server: figures.server.clone(),
            mbytes_per_sec: round_to(figures.sample.mbytes_per_sec, MBYTES_DECIMALS),
            mbits_per_sec: round_to(figures.sample.mbits_per_sec, MBITS_DECIMALS),
            seconds: round_to(figures.sample.seconds, SECONDS_DECIMALS),
        }
    }

    fn canonical(&self) -> String {
        format!(
            "{{\"server\":{},\"MBps\":{:.*},\"Mbps\":{:.*},\"seconds\":{:.*}}}",
            quote(&self.server),
            MBYTES_DECIMALS,
            clean(self.mbytes_per_sec),
            MBITS_DECIMALS,
            clean(self.mbits_per_sec),
            SECONDS_DECIMALS,
            clean(self.seconds)
        )
    }
}

/// Merges the three phase outputs into one sanitized result
pub struct Aggregator;

impl Aggregator {
    /// Build the immutable result for one run
    pub fn compose(
        latency: LatencySample,
        download: (SpeedSample, String),
        upload: (SpeedSample, String),
    ) -> TestResult {
        TestResult::new(
            sanitize_latency(latency),
            sanitize_phase(download),
            sanitize_phase(upload),
        )
    }

    /// Canonical JSON for a result
    pub fn to_json(result: &TestResult) -> String {
        JsonReport::from_result(result).to_canonical_string()
    }

    /// Read a canonical (or any schema-conforming) document back
    pub fn parse_json(text: &str) -> Result<JsonReport> {
        Ok(serde_json::from_str(text)?)
    }
}

fn sanitize_latency(sample: LatencySample) -> LatencySample {
    let received = sample.received.min(sample.sent);
    LatencySample {
        target: non_blank(&sample.target),
        sent: sample.sent,
        received,
        loss_pct: clean(sample.loss_pct).clamp(0.0, 100.0),
        avg_ms: clean(sample.avg_ms),
        jitter_ms: clean(sample.jitter_ms),
        reachable: sample.reachable,
    }
}

fn sanitize_phase((sample, server): (SpeedSample, String)) -> PhaseFigures {
    let sample = SpeedSample {
        seconds: clean(sample.seconds),
        mbytes_per_sec: clean(sample.mbytes_per_sec),
        mbits_per_sec: clean(sample.mbits_per_sec),
        server: non_blank(&sample.server),
        ..sample
    };
    PhaseFigures { server: non_blank(&server), sample }
}

/// Non-finite or non-positive becomes a plain zero (never `-0`)
fn clean(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, clean(value)).parse().unwrap_or(0.0)
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"unknown\"".to_string())
}
