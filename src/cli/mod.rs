//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

/// Speedbuffy - measure latency, download and upload throughput
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "speedbuffy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Reduced run: 10 MB payload, 5 second caps, 5 latency probes
    #[arg(long)]
    pub quick: bool,

    /// Print only the JSON result on stdout
    #[arg(long)]
    pub json: bool,

    /// Save the JSON result as speedbuffy-YYYYMMDD-HHMMSS.json
    #[arg(long)]
    pub save: bool,

    /// Save the JSON result to PATH
    #[arg(long, value_name = "PATH")]
    pub save_as: Option<PathBuf>,

    /// Payload size in megabytes for download and upload
    #[arg(long, value_name = "MB")]
    pub size: Option<u64>,

    /// Download time cap in seconds
    #[arg(long = "dl-cap", value_name = "SECS")]
    pub dl_cap: Option<u64>,

    /// Upload time cap in seconds
    #[arg(long = "ul-cap", value_name = "SECS")]
    pub ul_cap: Option<u64>,

    /// IP version for every connection (4, 6 or auto)
    #[arg(long, value_name = "4|6|auto")]
    pub ip: Option<String>,

    /// Download server: catalog name or http(s) URL template
    #[arg(long, value_name = "NAME|URL")]
    pub server: Option<String>,

    /// Upload server: catalog name or http(s) URL template
    #[arg(long, value_name = "NAME|URL")]
    pub upload_server: Option<String>,

    /// Upload mode (chunked or single)
    #[arg(long, value_name = "MODE")]
    pub upload_mode: Option<String>,

    /// Host probed for latency
    #[arg(long, value_name = "HOST")]
    pub latency_target: Option<String>,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Append a JSON-lines debug transcript to PATH
    #[arg(long, value_name = "PATH")]
    pub debug_log: Option<PathBuf>,

    /// List the built-in download and upload servers and exit
    #[arg(long)]
    pub list_servers: bool,

    /// Describe the supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.save && self.save_as.is_some() {
            return Err("Cannot specify both --save and --save-as".to_string());
        }

        Ok(())
    }

    /// Whether the run only prints information and never touches the network
    pub fn is_informational(&self) -> bool {
        self.list_servers || self.env_help
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
