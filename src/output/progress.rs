//! Live progress lines on stderr while a run is in flight

use crate::{
    engine::{Phase, ProgressObserver},
    types::TransferStrategy,
};
use colored::*;
use std::time::Duration;

/// Progress observer printing one line per event to stderr
pub struct ConsoleProgress {
    use_color: bool,
}

impl ConsoleProgress {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn tag(&self, phase: Phase) -> String {
        let tag = format!("[{}]", phase.as_str().to_uppercase());
        if self.use_color {
            tag.cyan().bold().to_string()
        } else {
            tag
        }
    }

    pub fn probe_line(&self, index: u32, elapsed: Duration, running_loss_pct: f64) -> String {
        format!(
            "{} probe {} at {:.1}s, loss so far {:.1}%",
            self.tag(Phase::Latency),
            index,
            elapsed.as_secs_f64(),
            running_loss_pct
        )
    }

    pub fn chunk_line(&self, phase: Phase, index: usize, total: usize, bytes: u64, elapsed: Duration) -> String {
        format!(
            "{} chunk {}/{} {} in {} ms",
            self.tag(phase),
            index + 1,
            total,
            super::formatter::format_bytes(bytes),
            elapsed.as_millis()
        )
    }

    pub fn attempt_line(&self, phase: Phase, server: &str, strategy: TransferStrategy) -> String {
        format!("{} trying {} ({})", self.tag(phase), server, strategy.as_str())
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_probe(&self, index: u32, elapsed: Duration, running_loss_pct: f64) {
        eprintln!("{}", self.probe_line(index, elapsed, running_loss_pct));
    }

    fn on_chunk(&self, phase: Phase, index: usize, total: usize, bytes: u64, elapsed: Duration) {
        eprintln!("{}", self.chunk_line(phase, index, total, bytes, elapsed));
    }

    fn on_attempt(&self, phase: Phase, server: &str, strategy: TransferStrategy) {
        eprintln!("{}", self.attempt_line(phase, server, strategy));
    }
}
