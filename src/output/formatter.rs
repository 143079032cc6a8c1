//! Core formatting trait and the plain text implementation
//!
//! Formatters only read a finished [`TestResult`]; they never see engine
//! internals.

use crate::{
    error::{AppError, Result},
    models::{LatencySample, PhaseFigures, TestResult},
    types::{Outcome, UNREACHABLE},
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format the latency/download/upload table
    fn format_summary_table(&self, result: &TestResult) -> Result<String>;

    /// Format warnings about partial or failed phases
    fn format_notes(&self, result: &TestResult) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show table borders
    pub table_borders: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            table_borders: true,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone, Copy)]
pub enum Alignment {
    Left,
    Right,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

pub(crate) const HEADERS: [&str; 4] = ["Test", "Server", "Result", "Detail"];
pub(crate) const ALIGNMENTS: [Alignment; 4] = [Alignment::Left, Alignment::Left, Alignment::Right, Alignment::Left];

/// Longest server name shown before truncation
const MAX_SERVER_WIDTH: usize = 40;

/// Severity of a note printed under the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    Warning,
    Error,
}

/// One line of commentary about the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub kind: NoteKind,
    pub text: String,
}

/// Table rows for a result: latency, download, upload
pub(crate) fn summary_rows(result: &TestResult) -> Vec<RowData> {
    vec![
        latency_row(result.latency()),
        transfer_row("Download", result.download()),
        transfer_row("Upload", result.upload()),
    ]
}

fn latency_row(latency: &LatencySample) -> RowData {
    let (server, value) = if latency.reachable {
        (latency.target.as_str(), format!("{:.2} ms", latency.avg_ms))
    } else {
        (UNREACHABLE, "-".to_string())
    };
    vec![
        "Latency".to_string(),
        truncate(server, MAX_SERVER_WIDTH),
        value,
        format!("jitter {:.2} ms, loss {}", latency.jitter_ms, format_percentage(latency.loss_pct)),
    ]
}

fn transfer_row(label: &str, figures: &PhaseFigures) -> RowData {
    let sample = &figures.sample;
    vec![
        label.to_string(),
        truncate(&figures.server, MAX_SERVER_WIDTH),
        format!("{:.1} Mbps", sample.mbits_per_sec),
        format!("{:.3} MB/s in {:.2} s, {}", sample.mbytes_per_sec, sample.seconds, sample.outcome.as_str()),
    ]
}

/// Commentary for every phase that did not complete cleanly
pub(crate) fn result_notes(result: &TestResult) -> Vec<Note> {
    let mut notes = Vec::new();

    let latency = result.latency();
    if !latency.reachable {
        notes.push(Note {
            kind: NoteKind::Error,
            text: format!("Latency target {} did not answer", latency.target),
        });
    } else if latency.loss_pct > 0.0 {
        notes.push(Note {
            kind: NoteKind::Warning,
            text: format!("{} of {} probes were lost", latency.sent - latency.received, latency.sent),
        });
    }

    for (label, figures) in [("Download", result.download()), ("Upload", result.upload())] {
        let sample = &figures.sample;
        match sample.outcome {
            Outcome::Success => {}
            Outcome::PartialFailure if sample.time_capped => notes.push(Note {
                kind: NoteKind::Warning,
                text: format!(
                    "{} hit the time cap after {}; figures cover the bytes moved so far",
                    label,
                    format_bytes(sample.bytes)
                ),
            }),
            Outcome::PartialFailure => notes.push(Note {
                kind: NoteKind::Warning,
                text: format!("{} was interrupted after {}", label, format_bytes(sample.bytes)),
            }),
            Outcome::Failed => notes.push(Note {
                kind: NoteKind::Error,
                text: format!("{} failed on every server (last tried: {})", label, figures.server),
            }),
        }
    }

    notes
}

/// Column widths fitting headers and every cell
pub(crate) fn column_widths(rows: &[RowData]) -> Vec<usize> {
    HEADERS
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            rows.iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| cell.chars().count())
                .fold(header.len(), usize::max)
        })
        .collect()
}

/// Align text within specified width
pub(crate) fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }

    let padding = " ".repeat(width - len);
    match alignment {
        Alignment::Left => format!("{}{}", text, padding),
        Alignment::Right => format!("{}{}", padding, text),
    }
}

/// Format percentage with appropriate precision
pub(crate) fn format_percentage(percentage: f64) -> String {
    format!("{:.1}%", percentage)
}

/// Byte count in the largest unit that keeps it readable
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let value = bytes as f64;
    if value >= KIB * KIB * KIB {
        format!("{:.2} GB", value / (KIB * KIB * KIB))
    } else if value >= KIB * KIB {
        format!("{:.1} MB", value / (KIB * KIB))
    } else if value >= KIB {
        format!("{:.1} KB", value / KIB)
    } else {
        format!("{} B", bytes)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
        cut.push_str("...");
        cut
    }
}

fn format_failure(context: &str) -> impl Fn(std::fmt::Error) -> AppError + '_ {
    move |e| AppError::internal(format!("Failed to format {}: {}", context, e))
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    fn create_row(&self, cells: &[String], widths: &[usize]) -> String {
        let mut row = String::new();
        if self.options.table_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in cells.iter().zip(widths).enumerate() {
            let padded = align_text(cell, width, ALIGNMENTS[idx]);
            if self.options.table_borders {
                row.push(' ');
                row.push_str(&padded);
                row.push_str(" |");
            } else {
                row.push_str(&padded);
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::from("+");
        for &width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
        border
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(format_failure("header"))?;
        writeln!(output, "  {}  ", title).map_err(format_failure("header"))?;
        write!(output, "{}", border).map_err(format_failure("header"))?;

        Ok(output)
    }

    fn format_summary_table(&self, result: &TestResult) -> Result<String> {
        let rows = summary_rows(result);
        let widths = column_widths(&rows);
        let headers: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
        let mut output = String::new();

        if self.options.table_borders {
            writeln!(output, "{}", self.create_horizontal_border(&widths)).map_err(format_failure("table"))?;
        }
        writeln!(output, "{}", self.create_row(&headers, &widths)).map_err(format_failure("table"))?;
        if self.options.table_borders {
            writeln!(output, "{}", self.create_horizontal_border(&widths)).map_err(format_failure("table"))?;
        }
        for row in &rows {
            writeln!(output, "{}", self.create_row(row, &widths)).map_err(format_failure("table"))?;
        }
        if self.options.table_borders {
            write!(output, "{}", self.create_horizontal_border(&widths)).map_err(format_failure("table"))?;
        }

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
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("OK: {}", message))
    }
}
