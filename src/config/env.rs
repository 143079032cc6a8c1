//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::types::{IpPreference, UploadMode};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists; existing variables win
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Commented-out .env template covering every supported variable
    pub fn example_env_content() -> String {
        r#"# Speedbuffy Configuration
#
# Values here act as defaults; environment variables set in the shell take
# precedence, and command-line flags override both.

# Payload size in megabytes for download and upload
# SPEEDBUFFY_SIZE_MB=100

# Time caps in seconds
# SPEEDBUFFY_DL_CAP=15
# SPEEDBUFFY_UL_CAP=15

# Byte ranges per ranged download
# SPEEDBUFFY_CHUNKS=10

# Upload mode: chunked or single
# SPEEDBUFFY_UPLOAD_MODE=chunked

# Latency probe target and probe count
# SPEEDBUFFY_LATENCY_TARGET=1.1.1.1
# SPEEDBUFFY_LATENCY_COUNT=10

# IP version: 4, 6 or auto
# SPEEDBUFFY_IP=auto

# Fixed servers (catalog name or http(s) URL template with BYTES / SIZE_MB)
# SPEEDBUFFY_SERVER=Cloudflare
# SPEEDBUFFY_UPLOAD_SERVER=Cloudflare

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#
        .to_string()
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "SPEEDBUFFY_SIZE_MB" => check_range(key, value, 1, 10_240),
            "SPEEDBUFFY_DL_CAP" | "SPEEDBUFFY_UL_CAP" => check_range(key, value, 1, 600),
            "SPEEDBUFFY_CHUNKS" | "SPEEDBUFFY_LATENCY_COUNT" => check_range(key, value, 1, 100),
            "SPEEDBUFFY_UPLOAD_MODE" => value.parse::<UploadMode>().map(|_| ()),
            "SPEEDBUFFY_IP" => value.parse::<IpPreference>().map(|_| ()),
            "SPEEDBUFFY_LATENCY_TARGET" => {
                if value.is_empty() {
                    Err(AppError::config("SPEEDBUFFY_LATENCY_TARGET cannot be empty"))
                } else {
                    Ok(())
                }
            }
            "SPEEDBUFFY_SERVER" | "SPEEDBUFFY_UPLOAD_SERVER" => {
                if value.contains("://") {
                    url::Url::parse(value)
                        .map(|_| ())
                        .map_err(|e| AppError::config(format!("Invalid {} URL '{}': {}", key, value, e)))
                } else {
                    Ok(())
                }
            }
            "ENABLE_COLOR" => value
                .parse::<bool>()
                .map(|_| ())
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e))),
            _ => Ok(()),
        }
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("SPEEDBUFFY_SIZE_MB", "Payload size in MB (1-10240)", "100"),
            ("SPEEDBUFFY_DL_CAP", "Download time cap in seconds (1-600)", "15"),
            ("SPEEDBUFFY_UL_CAP", "Upload time cap in seconds (1-600)", "15"),
            ("SPEEDBUFFY_CHUNKS", "Byte ranges per ranged download (1-100)", "10"),
            ("SPEEDBUFFY_UPLOAD_MODE", "Upload mode: chunked or single", "chunked"),
            ("SPEEDBUFFY_LATENCY_TARGET", "Host probed for latency", "1.1.1.1"),
            ("SPEEDBUFFY_LATENCY_COUNT", "Latency probes per run (1-100)", "10"),
            ("SPEEDBUFFY_IP", "IP version: 4, 6 or auto", "auto"),
            ("SPEEDBUFFY_SERVER", "Download server name or URL template", "Hetzner"),
            ("SPEEDBUFFY_UPLOAD_SERVER", "Upload server name or URL template", "Cloudflare"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<26} {}\n", var, description));
            help.push_str(&format!("  {:<26} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help.push_str("\nExample .env file:\n\n");
        help.push_str(&Self::example_env_content());

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, &value).err().map(|e| format!("Warning: {}", e))
            })
            .collect()
    }
}

fn check_range(key: &str, value: &str, min: u64, max: u64) -> Result<()> {
    let parsed: u64 = value
        .parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
    if parsed < min || parsed > max {
        return Err(AppError::config(format!("{} must be between {} and {}, got: {}", key, min, max, parsed)));
    }
    Ok(())
}
