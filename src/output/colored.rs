//! Colored formatter implementation with terminal color support
//!
//! Cells are padded on their plain text first and colored afterwards so the
//! escape codes never disturb column alignment.

use super::formatter::{
    align_text, column_widths, result_notes, summary_rows, FormattingOptions, NoteKind, OutputFormatter,
    ALIGNMENTS, HEADERS,
};
use crate::{
    error::{AppError, Result},
    models::TestResult,
    types::Outcome,
};
use colored::*;
use std::fmt::Write as _;

/// Quality classification used for color coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    Failed,
}

impl QualityLevel {
    /// Classify a throughput in megabits per second
    pub fn from_mbps(mbps: f64) -> Self {
        if mbps >= 100.0 {
            Self::Excellent
        } else if mbps >= 25.0 {
            Self::Good
        } else if mbps >= 5.0 {
            Self::Fair
        } else if mbps > 0.0 {
            Self::Poor
        } else {
            Self::Failed
        }
    }

    /// Classify a mean round-trip time in milliseconds
    pub fn from_latency_ms(avg_ms: f64, reachable: bool) -> Self {
        if !reachable {
            Self::Failed
        } else if avg_ms < 30.0 {
            Self::Excellent
        } else if avg_ms < 80.0 {
            Self::Good
        } else if avg_ms < 150.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::Failed => Color::Red,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::Failed => "Failed",
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
    pub border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
            border: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self {
            options,
            color_scheme: ColorScheme::default(),
        }
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self { options, color_scheme }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn border(&self, widths: &[usize]) -> String {
        let mut line = String::from("+");
        for &width in widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        self.colorize(&line, self.color_scheme.border).to_string()
    }

    /// Per-row color for the result column
    fn row_colors(&self, result: &TestResult) -> [Color; 3] {
        let latency = result.latency();
        [
            QualityLevel::from_latency_ms(latency.avg_ms, latency.reachable).color(),
            QualityLevel::from_mbps(result.download().sample.mbits_per_sec).color(),
            QualityLevel::from_mbps(result.upload().sample.mbits_per_sec).color(),
        ]
    }

    fn outcome_color(&self, outcome: Outcome) -> Color {
        match outcome {
            Outcome::Success => self.color_scheme.success,
            Outcome::PartialFailure => self.color_scheme.warning,
            Outcome::Failed => self.color_scheme.error,
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let decorated_title = format!("🎯 {}", title);
        let border = "═".repeat(decorated_title.chars().count() + 4);

        writeln!(output, "{}", self.colorize(&border, self.color_scheme.border))
            .map_err(|e| AppError::internal(format!("Failed to format header: {}", e)))?;
        writeln!(output, "  {}  ", self.bold(&decorated_title).color(self.color_scheme.header))
            .map_err(|e| AppError::internal(format!("Failed to format header: {}", e)))?;
        write!(output, "{}", self.colorize(&border, self.color_scheme.border))
            .map_err(|e| AppError::internal(format!("Failed to format header: {}", e)))?;

        Ok(output)
    }

    fn format_summary_table(&self, result: &TestResult) -> Result<String> {
        let rows = summary_rows(result);
        let widths = column_widths(&rows);
        let bar = self.colorize("|", self.color_scheme.border).to_string();
        let mut output = String::new();

        writeln!(output, "{}", self.border(&widths))
            .map_err(|e| AppError::internal(format!("Failed to format table: {}", e)))?;
        let header_cells: Vec<String> = HEADERS
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(idx, (h, &w))| self.bold(&align_text(h, w, ALIGNMENTS[idx])).to_string())
            .collect();
        writeln!(output, "{} {} {}", bar, header_cells.join(&format!(" {} ", bar)), bar)
            .map_err(|e| AppError::internal(format!("Failed to format table: {}", e)))?;
        writeln!(output, "{}", self.border(&widths))
            .map_err(|e| AppError::internal(format!("Failed to format table: {}", e)))?;

        let colors = self.row_colors(result);
        let outcomes = [
            None,
            Some(result.download().sample.outcome),
            Some(result.upload().sample.outcome),
        ];
        for ((row, color), outcome) in rows.iter().zip(colors).zip(outcomes) {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .enumerate()
                .map(|(idx, (cell, &w))| {
                    let padded = align_text(cell, w, ALIGNMENTS[idx]);
                    match idx {
                        0 => self.colorize(&padded, self.color_scheme.info).to_string(),
                        2 => self.bold(&padded).color(color).to_string(),
                        3 => match outcome {
                            Some(outcome) => self.colorize(&padded, self.outcome_color(outcome)).to_string(),
                            None => self.colorize(&padded, self.color_scheme.muted).to_string(),
                        },
                        _ => padded,
                    }
                })
                .collect();
            writeln!(output, "{} {} {}", bar, cells.join(&format!(" {} ", bar)), bar)
                .map_err(|e| AppError::internal(format!("Failed to format table: {}", e)))?;
        }
        write!(output, "{}", self.border(&widths))
            .map_err(|e| AppError::internal(format!("Failed to format table: {}", e)))?;

        Ok(output)
    }

    fn format_notes(&self, result: &TestResult) -> Result<String> {
        let lines = result_notes(result)
            .into_iter()
            .map(|note| match note.kind {
                NoteKind::Warning => self.format_warning(&note.text),
                NoteKind::Error => self.format_error(&note.text),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(lines.join("\n"))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("❌ {}", self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("⚠️  {}", self.colorize(warning, self.color_scheme.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("✅ {}", self.colorize(message, self.color_scheme.success)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregator::Aggregator,
        models::{LatencySample, SpeedSample},
        types::TransferStrategy,
    };

    fn sample_result() -> TestResult {
        Aggregator::compose(
            LatencySample::from_rtts("1.1.1.1", 2, &[20.0, 22.0]),
            (
                SpeedSample::measured(52_428_800, 2.0, "https://dl", Outcome::Success, TransferStrategy::RangedChunked),
                "Cloudflare".to_string(),
            ),
            (SpeedSample::failed("https://up"), "httpbin".to_string()),
        )
    }

    #[test]
    fn test_quality_levels() {
        assert_eq!(QualityLevel::from_mbps(250.0), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_mbps(30.0), QualityLevel::Good);
        assert_eq!(QualityLevel::from_mbps(0.5), QualityLevel::Poor);
        assert_eq!(QualityLevel::from_mbps(0.0), QualityLevel::Failed);
        assert_eq!(QualityLevel::from_latency_ms(12.0, true), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_latency_ms(0.0, false), QualityLevel::Failed);
        assert_eq!(QualityLevel::Failed.color(), Color::Red);
    }

    #[test]
    fn test_uncolored_table_matches_plain_content() {
        let formatter = ColoredFormatter::new(FormattingOptions { enable_color: false, table_borders: true });
        let table = formatter.format_summary_table(&sample_result()).unwrap();

        assert!(table.contains("200.0 Mbps"));
        assert!(table.contains("httpbin"));
        assert!(table.contains("failed"));
        let widths: Vec<usize> = table.lines().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "ragged table:\n{}", table);
    }

    #[test]
    fn test_notes_use_symbols() {
        let formatter = ColoredFormatter::new(FormattingOptions { enable_color: false, table_borders: true });
        let notes = formatter.format_notes(&sample_result()).unwrap();
        assert!(notes.starts_with("❌ Upload failed on every server"));
    }

    #[test]
    fn test_header_contains_title() {
        let formatter = ColoredFormatter::new(FormattingOptions { enable_color: false, table_borders: true });
        let header = formatter.format_header("Speed Test Results").unwrap();
        assert!(header.contains("Speed Test Results"));
        assert_eq!(header.lines().count(), 3);
    }
}
