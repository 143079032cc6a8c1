//! Output formatting and display system
//!
//! Summary tables (plain or colored), live progress lines and the JSON file
//! writer. Everything here consumes the aggregator's result only.

mod colored;
mod formatter;
mod progress;
mod writer;

pub use colored::{ColorScheme, ColoredFormatter, QualityLevel};
pub use formatter::{Alignment, FormattingOptions, Note, NoteKind, OutputFormatter, PlainFormatter, RowData};
pub use progress::ConsoleProgress;
pub use writer::ResultWriter;

use crate::{error::Result, models::TestResult};
use std::path::Path;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            table_borders: true,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false)
    }
}

/// Main output coordinator that handles result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
}

impl OutputCoordinator {
    /// Create a new output coordinator with the specified formatter
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self { formatter }
    }

    /// Header, summary table and any notes for one run
    pub fn display_result(&self, result: &TestResult) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.formatter.format_header("Speed Test Results")?);
        output.push_str("\n\n");
        output.push_str(&self.formatter.format_summary_table(result)?);

        let notes = self.formatter.format_notes(result)?;
        if !notes.is_empty() {
            output.push_str("\n\n");
            output.push_str(&notes);
        }

        Ok(output)
    }

    /// Confirmation line after the JSON file was written
    pub fn display_saved(&self, path: &Path) -> Result<String> {
        self.formatter.format_success(&format!("Result saved to {}", path.display()))
    }
}
