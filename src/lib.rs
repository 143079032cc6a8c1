//! Speedbuffy
//!
//! A network speed tester that measures latency, download throughput and
//! upload throughput against an ordered catalog of public endpoints, and
//! emits a sanitized result record for display or JSON export.

pub mod aggregator;
pub mod app;
pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, EngineSettings, LatencySample, SpeedSample, TestResult};
pub use catalog::{Catalog, ServerDescriptor};
pub use aggregator::{Aggregator, JsonReport};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Name, version and build provenance, as shown in debug output
pub fn build_info() -> String {
    let mut info = format!("{} v{} ({}, built {}", PKG_NAME, VERSION, env!("TARGET_TRIPLE"), env!("BUILD_TIME"));
    if let Some(commit) = option_env!("GIT_COMMIT") {
        info.push_str(&format!(", commit {}", commit));
    }
    info.push(')');
    info
}

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_SIZE_MB: u64 = 100;
    pub const DEFAULT_DOWNLOAD_CAP: Duration = Duration::from_secs(15);
    pub const DEFAULT_UPLOAD_CAP: Duration = Duration::from_secs(15);
    pub const DEFAULT_CHUNK_COUNT: u32 = 10;
    pub const DEFAULT_UPLOAD_CHUNK_MB: u64 = 8;
    pub const DEFAULT_LATENCY_TARGET: &str = "1.1.1.1";
    pub const DEFAULT_LATENCY_PORT: u16 = 443;
    pub const DEFAULT_LATENCY_COUNT: u32 = 10;
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
    pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(200);
    pub const DEFAULT_CAPABILITY_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    /// Reduced profile applied by `--quick`
    pub const QUICK_SIZE_MB: u64 = 10;
    pub const QUICK_CAP: Duration = Duration::from_secs(5);
    pub const QUICK_LATENCY_COUNT: u32 = 5;

    /// 1 MB as used for every MBps figure
    pub const BYTES_PER_MB: u64 = 1_048_576;
    /// Floor applied to elapsed seconds before dividing
    pub const ELAPSED_EPSILON: f64 = 0.001;
    /// Block size of generated upload bodies
    pub const UPLOAD_BLOCK_BYTES: usize = 64 * 1024;
}
