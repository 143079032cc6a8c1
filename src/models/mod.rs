//! Data models and structures for the speed tester

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::{Config, EngineSettings, LatencySettings};
pub use metrics::{LatencySample, PhaseFigures, SpeedSample, TestResult};
