//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::{AppError, Result},
    models::Config,
    types::{IpPreference, UploadMode},
};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    ///
    /// Layers, lowest first: defaults, `.env`, environment, CLI flags.
    pub fn parse(&self) -> Result<Config> {
        self.cli.validate().map_err(AppError::config)?;

        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) -> Result<()> {
        let cli = &self.cli;

        // Explicit size/cap flags below still win over the profile
        if cli.quick {
            config.apply_quick_profile();
        }

        if let Some(size) = cli.size {
            config.size_mb = size;
        }
        if let Some(cap) = cli.dl_cap {
            config.download_cap_secs = cap;
        }
        if let Some(cap) = cli.ul_cap {
            config.upload_cap_secs = cap;
        }

        if let Some(ref ip) = cli.ip {
            config.ip_preference = ip.parse::<IpPreference>()?;
        }
        if let Some(ref mode) = cli.upload_mode {
            config.upload_mode = mode.parse::<UploadMode>()?;
        }

        if let Some(ref server) = cli.server {
            config.download_server = Some(server.trim().to_string());
        }
        if let Some(ref server) = cli.upload_server {
            config.upload_server = Some(server.trim().to_string());
        }
        if let Some(ref target) = cli.latency_target {
            config.latency_target = target.trim().to_string();
        }

        config.json_only = cli.json;
        config.save = cli.save || cli.save_as.is_some();
        config.save_path = cli.save_as.clone();

        // Progress lines and the table share this one decision
        if cli.color {
            config.enable_color = true;
        } else if cli.no_color || cli.json {
            config.enable_color = false;
        } else {
            config.enable_color = config.enable_color && cli.use_colors();
        }

        config.debug = cli.debug;
        config.debug_log = cli.debug_log.clone();

        Ok(())
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Payload: {} MB", config.size_mb));
    summary.push(format!(
        "Time caps: download {}s, upload {}s",
        config.download_cap_secs, config.upload_cap_secs
    ));
    summary.push(format!("Ranged chunks: {}", config.chunk_count));
    summary.push(format!(
        "Upload: {:?}, {} MB chunks",
        config.upload_mode, config.upload_chunk_mb
    ));
    summary.push(format!(
        "Latency: {} probes to {}:{}",
        config.latency_count, config.latency_target, config.latency_port
    ));
    summary.push(format!("IP version: {}", config.ip_preference));
    summary.push(format!(
        "Download server: {}",
        config.download_server.as_deref().unwrap_or("catalog order")
    ));
    summary.push(format!(
        "Upload server: {}",
        config.upload_server.as_deref().unwrap_or("catalog order")
    ));
    summary.push(format!("Quick profile: {}", config.quick));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Debug: {}", config.debug));
    if let Some(ref path) = config.debug_log {
        summary.push(format!("Debug transcript: {}", path.display()));
    }

    summary.join("\n")
}
