//! Configuration data model and validation

use crate::catalog::{Catalog, DOWNLOAD_SERVERS, UPLOAD_SERVERS};
use crate::defaults;
use crate::types::{AppError, IpPreference, Result, UploadMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Payload size for download and upload, in megabytes
    #[serde(default = "default_size_mb")]
    pub size_mb: u64,

    /// Download time cap in seconds
    #[serde(default = "default_download_cap")]
    pub download_cap_secs: u64,

    /// Upload time cap in seconds
    #[serde(default = "default_upload_cap")]
    pub upload_cap_secs: u64,

    /// Number of byte ranges a ranged download is split into
    #[serde(default = "default_chunk_count")]
    pub chunk_count: u32,

    /// Upload chunk size in megabytes
    #[serde(default = "default_upload_chunk_mb")]
    pub upload_chunk_mb: u64,

    #[serde(default)]
    pub upload_mode: UploadMode,

    /// Host or address probed for latency
    #[serde(default = "default_latency_target")]
    pub latency_target: String,

    /// TCP port the latency probe connects to
    #[serde(default = "default_latency_port")]
    pub latency_port: u16,

    /// Number of latency probes
    #[serde(default = "default_latency_count")]
    pub latency_count: u32,

    /// Per-probe timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    #[serde(default)]
    pub ip_preference: IpPreference,

    /// Explicit download server (catalog name or URL template)
    #[serde(default)]
    pub download_server: Option<String>,

    /// Explicit upload server (catalog name or URL template)
    #[serde(default)]
    pub upload_server: Option<String>,

    /// Reduced quick-run profile
    #[serde(default)]
    pub quick: bool,

    /// Print only the JSON document
    #[serde(default)]
    pub json_only: bool,

    /// Save JSON to an auto-named file
    #[serde(default)]
    pub save: bool,

    /// Save JSON to this path
    #[serde(default)]
    pub save_path: Option<PathBuf>,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,

    /// Append the debug transcript to this file
    #[serde(default)]
    pub debug_log: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            size_mb: default_size_mb(),
            download_cap_secs: default_download_cap(),
            upload_cap_secs: default_upload_cap(),
            chunk_count: default_chunk_count(),
            upload_chunk_mb: default_upload_chunk_mb(),
            upload_mode: UploadMode::default(),
            latency_target: default_latency_target(),
            latency_port: default_latency_port(),
            latency_count: default_latency_count(),
            probe_timeout_secs: default_probe_timeout(),
            ip_preference: IpPreference::default(),
            download_server: None,
            upload_server: None,
            quick: false,
            json_only: false,
            save: false,
            save_path: None,
            enable_color: default_enable_color(),
            debug: false,
            debug_log: None,
        }
    }
}

/// Latency prober parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySettings {
    pub target: String,
    pub port: u16,
    pub count: u32,
    pub probe_timeout: Duration,
    pub interval: Duration,
}

/// Immutable engine configuration, passed explicitly into every phase
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub size_bytes: u64,
    pub download_cap: Duration,
    pub upload_cap: Duration,
    pub chunk_count: u32,
    pub upload_chunk_bytes: u64,
    pub upload_mode: UploadMode,
    pub capability_timeout: Duration,
    pub ip_preference: IpPreference,
    pub download_catalog: Catalog,
    pub upload_catalog: Catalog,
    pub latency: LatencySettings,
}

impl EngineSettings {
    /// Settings for the given catalogs with every other knob at its default
    pub fn with_catalogs(download_catalog: Catalog, upload_catalog: Catalog) -> Self {
        Self {
            size_bytes: defaults::DEFAULT_SIZE_MB * defaults::BYTES_PER_MB,
            download_cap: defaults::DEFAULT_DOWNLOAD_CAP,
            upload_cap: defaults::DEFAULT_UPLOAD_CAP,
            chunk_count: defaults::DEFAULT_CHUNK_COUNT,
            upload_chunk_bytes: defaults::DEFAULT_UPLOAD_CHUNK_MB * defaults::BYTES_PER_MB,
            upload_mode: UploadMode::default(),
            capability_timeout: defaults::DEFAULT_CAPABILITY_TIMEOUT,
            ip_preference: IpPreference::default(),
            download_catalog,
            upload_catalog,
            latency: LatencySettings {
                target: defaults::DEFAULT_LATENCY_TARGET.to_string(),
                port: defaults::DEFAULT_LATENCY_PORT,
                count: defaults::DEFAULT_LATENCY_COUNT,
                probe_timeout: defaults::DEFAULT_PROBE_TIMEOUT,
                interval: defaults::DEFAULT_PROBE_INTERVAL,
            },
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn download_cap(&self) -> Duration {
        Duration::from_secs(self.download_cap_secs)
    }

    pub fn upload_cap(&self) -> Duration {
        Duration::from_secs(self.upload_cap_secs)
    }

    /// Switch to the reduced quick-run profile
    pub fn apply_quick_profile(&mut self) {
        self.quick = true;
        self.size_mb = defaults::QUICK_SIZE_MB;
        self.download_cap_secs = defaults::QUICK_CAP.as_secs();
        self.upload_cap_secs = defaults::QUICK_CAP.as_secs();
        self.latency_count = defaults::QUICK_LATENCY_COUNT;
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.size_mb == 0 || self.size_mb > 10_240 {
            return Err(AppError::config(format!("Size must be between 1 and 10240 MB, got {}", self.size_mb)));
        }

        if self.download_cap_secs == 0 || self.download_cap_secs > 600 {
            return Err(AppError::config(format!(
                "Download time cap must be between 1 and 600 seconds, got {}",
                self.download_cap_secs
            )));
        }

        if self.upload_cap_secs == 0 || self.upload_cap_secs > 600 {
            return Err(AppError::config(format!(
                "Upload time cap must be between 1 and 600 seconds, got {}",
                self.upload_cap_secs
            )));
        }

        if self.chunk_count == 0 || self.chunk_count > 100 {
            return Err(AppError::config(format!("Chunk count must be between 1 and 100, got {}", self.chunk_count)));
        }

        if self.upload_chunk_mb == 0 || self.upload_chunk_mb > self.size_mb.max(1) * 2 {
            return Err(AppError::config(format!("Invalid upload chunk size: {} MB", self.upload_chunk_mb)));
        }

        if self.latency_target.trim().is_empty() {
            return Err(AppError::config("Latency target cannot be empty"));
        }

        if self.latency_port == 0 {
            return Err(AppError::config("Latency port cannot be 0"));
        }

        if self.latency_count == 0 || self.latency_count > 100 {
            return Err(AppError::config(format!("Latency probe count must be between 1 and 100, got {}", self.latency_count)));
        }

        if self.probe_timeout_secs == 0 || self.probe_timeout_secs > 30 {
            return Err(AppError::config(format!(
                "Probe timeout must be between 1 and 30 seconds, got {}",
                self.probe_timeout_secs
            )));
        }

        if let Some(path) = &self.save_path {
            if path.as_os_str().is_empty() {
                return Err(AppError::config("Output file path cannot be empty"));
            }
        }

        Ok(())
    }

    /// Resolve catalogs and produce the immutable engine settings
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        self.validate()?;

        let download_catalog = Catalog::select(DOWNLOAD_SERVERS, self.download_server.as_deref())?;
        let upload_catalog = Catalog::select(UPLOAD_SERVERS, self.upload_server.as_deref())?;

        Ok(EngineSettings {
            size_bytes: self.size_mb * defaults::BYTES_PER_MB,
            download_cap: self.download_cap(),
            upload_cap: self.upload_cap(),
            chunk_count: self.chunk_count,
            upload_chunk_bytes: self.upload_chunk_mb * defaults::BYTES_PER_MB,
            upload_mode: self.upload_mode,
            capability_timeout: defaults::DEFAULT_CAPABILITY_TIMEOUT,
            ip_preference: self.ip_preference,
            download_catalog,
            upload_catalog,
            latency: LatencySettings {
                target: self.latency_target.trim().to_string(),
                port: self.latency_port,
                count: self.latency_count,
                probe_timeout: Duration::from_secs(self.probe_timeout_secs),
                interval: defaults::DEFAULT_PROBE_INTERVAL,
            },
        })
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(size) = std::env::var("SPEEDBUFFY_SIZE_MB") {
            self.size_mb = parse_env("SPEEDBUFFY_SIZE_MB", &size)?;
        }

        if let Ok(cap) = std::env::var("SPEEDBUFFY_DL_CAP") {
            self.download_cap_secs = parse_env("SPEEDBUFFY_DL_CAP", &cap)?;
        }

        if let Ok(cap) = std::env::var("SPEEDBUFFY_UL_CAP") {
            self.upload_cap_secs = parse_env("SPEEDBUFFY_UL_CAP", &cap)?;
        }

        if let Ok(chunks) = std::env::var("SPEEDBUFFY_CHUNKS") {
            self.chunk_count = parse_env("SPEEDBUFFY_CHUNKS", &chunks)?;
        }

        if let Ok(mode) = std::env::var("SPEEDBUFFY_UPLOAD_MODE") {
            self.upload_mode = mode.parse()?;
        }

        if let Ok(target) = std::env::var("SPEEDBUFFY_LATENCY_TARGET") {
            self.latency_target = target.trim().to_string();
        }

        if let Ok(count) = std::env::var("SPEEDBUFFY_LATENCY_COUNT") {
            self.latency_count = parse_env("SPEEDBUFFY_LATENCY_COUNT", &count)?;
        }

        if let Ok(ip) = std::env::var("SPEEDBUFFY_IP") {
            self.ip_preference = ip.parse()?;
        }

        if let Ok(server) = std::env::var("SPEEDBUFFY_SERVER") {
            self.download_server = Some(server).filter(|s| !s.trim().is_empty());
        }

        if let Ok(server) = std::env::var("SPEEDBUFFY_UPLOAD_SERVER") {
            self.upload_server = Some(server).filter(|s| !s.trim().is_empty());
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = parse_env("ENABLE_COLOR", &enable_color)?;
        }

        if std::env::var_os("NO_COLOR").is_some() {
            self.enable_color = false;
        }

        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))
}

// Default value functions for serde
fn default_size_mb() -> u64 {
    defaults::DEFAULT_SIZE_MB
}

fn default_download_cap() -> u64 {
    defaults::DEFAULT_DOWNLOAD_CAP.as_secs()
}

fn default_upload_cap() -> u64 {
    defaults::DEFAULT_UPLOAD_CAP.as_secs()
}

fn default_chunk_count() -> u32 {
    defaults::DEFAULT_CHUNK_COUNT
}

fn default_upload_chunk_mb() -> u64 {
    defaults::DEFAULT_UPLOAD_CHUNK_MB
}

fn default_latency_target() -> String {
    defaults::DEFAULT_LATENCY_TARGET.to_string()
}

fn default_latency_port() -> u16 {
    defaults::DEFAULT_LATENCY_PORT
}

fn default_latency_count() -> u32 {
    defaults::DEFAULT_LATENCY_COUNT
}

fn default_probe_timeout() -> u64 {
    defaults::DEFAULT_PROBE_TIMEOUT.as_secs()
}

fn default_enable_color() -> bool {
    defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_size_invalid() {
        let mut config = Config::default();
        config.size_mb = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_zero_caps_invalid() {
        let mut config = Config::default();
        config.download_cap_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.upload_cap_secs = 601;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_latency_bounds() {
        let mut config = Config::default();
        config.latency_count = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.latency_target = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_quick_profile() {
        let mut config = Config::default();
        config.apply_quick_profile();
        assert!(config.quick);
        assert_eq!(config.size_mb, defaults::QUICK_SIZE_MB);
        assert_eq!(config.download_cap(), defaults::QUICK_CAP);
        assert_eq!(config.latency_count, defaults::QUICK_LATENCY_COUNT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_settings_from_defaults() {
        let settings = Config::default().engine_settings().unwrap();
        assert_eq!(settings.size_bytes, 100 * 1_048_576);
        assert_eq!(settings.chunk_count, 10);
        assert_eq!(settings.upload_chunk_bytes, 8 * 1_048_576);
        assert!(!settings.download_catalog.is_pinned());
        assert_eq!(settings.latency.count, 10);
    }

    #[test]
    fn test_engine_settings_pin_selected_server() {
        let mut config = Config::default();
        config.download_server = Some("tele2".to_string());
        let settings = config.engine_settings().unwrap();
        assert!(settings.download_catalog.is_pinned());
        assert!(!settings.upload_catalog.is_pinned());
    }

    #[test]
    fn test_engine_settings_reject_unknown_server() {
        let mut config = Config::default();
        config.upload_server = Some("nowhere".to_string());
        assert!(matches!(config.engine_settings(), Err(AppError::Config(_))));
    }
}
