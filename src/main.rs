//! Speedbuffy - Main CLI Application
//!
//! Measures latency, download and upload throughput against public
//! endpoints and prints a summary table or a JSON document.

use clap::Parser;
use speedbuffy::{app::App, cli::Cli, error::ErrorReporter};
use std::process;

#[tokio::main]
async fn main() {
    // Set up better panic handling
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.debug);

    let outcome = match App::new(cli) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        reporter.report_error(&e);
        process::exit(e.exit_code());
    }
}
