//! Markdown run log, newest entry first.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

use crate::error::Result;

/// Markdown file recording every command run against a project.
///
/// Entries are prepended:
///
/// ```text
/// # 2024-07-10 14:03
/// ## `generate`
/// - Parameters:
///   - input: `trial.mat`
/// - Notes:
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    /// Log stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render one entry.
    #[must_use]
    pub fn format_entry(timestamp: &str, command: &str, params: &[(&str, String)]) -> String {
        let mut entry = format!("# {timestamp} \n## `{command}`\n");
        if !params.is_empty() {
            entry.push_str("- Parameters:\n");
            entry.extend(
                params
                    .iter()
                    .map(|(name, value)| format!("  - {name}: `{value}`\n")),
            );
        }
        entry.push_str("- Notes:\n\n");
        entry
    }

    /// Prepend an entry stamped with the local time, creating the file if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or written.
    pub fn record(&self, command: &str, params: &[(&str, String)]) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M").to_string();
        self.prepend(&Self::format_entry(&timestamp, command, params))
    }

    fn prepend(&self, entry: &str) -> Result<()> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };
        fs::write(&self.path, format!("{entry}{existing}"))?;
        debug!(path = %self.path.display(), "Updated run log");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn entry_layout() {
        let entry = RunLog::format_entry(
            "2024-07-10 14:03",
            "generate",
            &[("input", "trial.mat".to_string())],
        );
        assert_eq!(
            entry,
            "# 2024-07-10 14:03 \n## `generate`\n- Parameters:\n  - input: `trial.mat`\n- Notes:\n\n"
        );
    }

    #[test]
    fn entry_without_parameters() {
        let entry = RunLog::format_entry("t", "states", &[]);
        assert!(!entry.contains("Parameters"));
    }

    #[test]
    fn newest_entry_first() {
        let dir = tempdir().unwrap();
        let log = RunLog::new(dir.path().join("runs.md"));
        log.record("generate", &[]).unwrap();
        log.record("extract", &[]).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        let extract = text.find("`extract`").unwrap();
        let generate = text.find("`generate`").unwrap();
        assert!(extract < generate);
    }
}
