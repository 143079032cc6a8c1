//! Saving the JSON document to disk

use crate::error::{AppError, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes result documents verbatim
#[derive(Debug, Clone)]
pub struct ResultWriter {
    directory: PathBuf,
    verbose: bool,
}

impl ResultWriter {
    /// Writer placing timestamped files in `directory`
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self { directory: directory.into(), verbose: false }
    }

    /// Writer placing timestamped files in the working directory
    pub fn in_current_dir() -> Self {
        Self::new(".")
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// `speedbuffy-YYYYMMDD-HHMMSS.json` for the given local time
    pub fn default_file_name(now: DateTime<Local>) -> String {
        format!("speedbuffy-{}.json", now.format("%Y%m%d-%H%M%S"))
    }

    /// Save `json` to `path`, or to a timestamped file when none is given
    pub fn save(&self, json: &str, path: Option<&Path>) -> Result<PathBuf> {
        let target = match path {
            Some(path) => path.to_path_buf(),
            None => self.directory.join(Self::default_file_name(Local::now())),
        };

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::io(format!("Failed to create directory '{}': {}", parent.display(), e))
                })?;
            }
        }

        if self.verbose {
            eprintln!("[SAVE] Writing result to: {}", target.display());
        }

        fs::write(&target, json)
            .map_err(|e| AppError::io(format!("Failed to write result file '{}': {}", target.display(), e)))?;

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_default_file_name_layout() {
        let at = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(ResultWriter::default_file_name(at), "speedbuffy-20260307-090501.json");
    }

    #[test]
    fn test_save_to_explicit_path_is_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("run.json");
        let json = "{\"latency\":{}}";

        let written = ResultWriter::in_current_dir().save(json, Some(&path)).unwrap();

        assert_eq!(written, path);
        assert_eq!(fs::read_to_string(&path).unwrap(), json);
    }

    #[test]
    fn test_save_uses_timestamped_name() {
        let dir = TempDir::new().unwrap();
        let written = ResultWriter::new(dir.path()).save("{}", None).unwrap();

        let name = written.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("speedbuffy-"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "speedbuffy-YYYYMMDD-HHMMSS.json".len());
        assert_eq!(written.parent().unwrap(), dir.path());
    }

    #[test]
    fn test_unwritable_target_is_io_error() {
        let dir = TempDir::new().unwrap();
        let error = ResultWriter::in_current_dir().save("{}", Some(dir.path())).unwrap_err();
        assert!(matches!(error, AppError::Io(_)));
    }
}
