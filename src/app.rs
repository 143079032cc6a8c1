//! Main application orchestration and execution

use crate::{
    aggregator::Aggregator,
    catalog::Catalog,
    cli::Cli,
    client::TransferClient,
    config::{display_config_summary, load_config, EnvManager},
    engine::{DownloadEngine, NoProgress, PhaseReport, ProgressObserver, UploadEngine},
    error::Result,
    logging::{Logger, LoggerFactory},
    models::{Config, TestResult},
    output::{ConsoleProgress, OutputCoordinator, OutputFormatterFactory, ResultWriter},
    probe::LatencyProber,
};

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Result<Self> {
        Ok(Self { cli })
    }

    /// Run the application
    pub async fn run(self) -> Result<()> {
        if self.cli.is_informational() {
            if self.cli.list_servers {
                print!("{}", server_listing());
            }
            if self.cli.env_help {
                print!("{}", EnvManager::display_env_help());
            }
            return Ok(());
        }

        // Every invalid value is rejected here, before any network activity
        let config = load_config(self.cli.clone())?;

        if config.debug {
            eprintln!("{}", crate::build_info());
            eprintln!("Configuration Summary:");
            eprintln!("{}", display_config_summary(&config));
            for warning in EnvManager::validate_current_env() {
                eprintln!("  {}", warning);
            }
            eprintln!();
        }

        let result = measure(&config).await?;
        let json = Aggregator::to_json(&result);

        if config.json_only {
            println!("{}", json);
        } else {
            let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(config.enable_color));
            println!("{}", coordinator.display_result(&result)?);
        }

        if config.save || config.save_path.is_some() {
            let path = ResultWriter::in_current_dir()
                .with_verbose(config.debug)
                .save(&json, config.save_path.as_deref())?;
            if !config.json_only {
                let coordinator =
                    OutputCoordinator::new(OutputFormatterFactory::create_formatter(config.enable_color));
                println!("{}", coordinator.display_saved(&path)?);
            }
        }

        Ok(())
    }
}

/// Run latency, download and upload in order and compose the result
///
/// A failed phase never stops the next one; only configuration problems
/// surface as errors.
pub async fn measure(config: &Config) -> Result<TestResult> {
    let settings = config.engine_settings()?;
    let loggers = LoggerFactory::new(config)?;
    let client = TransferClient::new(settings.ip_preference)?;

    let console = ConsoleProgress::new(config.enable_color);
    let observer: &dyn ProgressObserver = if config.json_only { &NoProgress } else { &console };

    let app_logger = loggers.create_logger("app");
    app_logger
        .debug("starting run")
        .field("session", loggers.session_id())
        .field("size_bytes", settings.size_bytes)
        .log()
        .await;

    let latency = LatencyProber::new(loggers.create_logger("latency"), observer, settings.latency.interval)
        .run(&settings.latency, settings.ip_preference)
        .await;

    let download = DownloadEngine::new(&client, &settings, loggers.create_logger("download"), observer)
        .run()
        .await;
    log_attempts(&app_logger, "download", &download).await;

    let upload = UploadEngine::new(&client, &settings, loggers.create_logger("upload"), observer)
        .run()
        .await;
    log_attempts(&app_logger, "upload", &upload).await;

    Ok(Aggregator::compose(latency, download.into_pair(), upload.into_pair()))
}

async fn log_attempts(logger: &Logger, phase: &str, report: &PhaseReport) {
    for attempt in &report.attempts {
        logger
            .debug("attempt")
            .field("phase", phase)
            .field("server", &attempt.server)
            .field("url", &attempt.url)
            .field("strategy", attempt.strategy.as_str())
            .field("result", &attempt.result)
            .log()
            .await;
    }
}

/// Both built-in catalogs, in the order they are consulted
pub fn server_listing() -> String {
    let mut text = String::from("Download servers:\n");
    for server in Catalog::default_download().servers() {
        text.push_str(&format!("  {:<16} {}\n", server.name(), server.template()));
    }
    text.push_str("\nUpload servers:\n");
    for server in Catalog::default_upload().servers() {
        text.push_str(&format!("  {:<16} {}\n", server.name(), server.template()));
    }
    text
}
