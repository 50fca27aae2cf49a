//! Locating input files inside directories.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// More than one file matched a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousFileMatch {
    /// Substring searched for.
    pub needle: String,
    /// Every matching file, sorted.
    pub candidates: Vec<PathBuf>,
}

impl fmt::Display for AmbiguousFileMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files match `{}`: ",
            self.candidates.len(),
            self.needle
        )?;
        for (i, path) in self.candidates.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", path.display())?;
        }
        Ok(())
    }
}

impl std::error::Error for AmbiguousFileMatch {}

fn collect_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Files under `dir` (recursively) whose name contains `needle`, ignoring
/// case. Symbolic links are not followed.
///
/// # Errors
///
/// Returns [`AmbiguousFileMatch`] when more than one file matches.
pub fn search_dir(dir: &Path, needle: &str) -> Result<Option<PathBuf>, AmbiguousFileMatch> {
    let needle_lower = needle.to_lowercase();
    let mut candidates: Vec<PathBuf> = collect_files(dir)
        .into_iter()
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().to_lowercase().contains(&needle_lower))
        })
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.pop()),
        _ => Err(AmbiguousFileMatch {
            needle: needle.to_string(),
            candidates,
        }),
    }
}

/// The single file under `dir` whose name contains `needle`.
///
/// No match and several matches both yield `None`; the latter is logged.
#[must_use]
pub fn find_file_in_dir(dir: &Path, needle: &str) -> Option<PathBuf> {
    match search_dir(dir, needle) {
        Ok(found) => found,
        Err(ambiguous) => {
            warn!(dir = %dir.display(), "{ambiguous}, selecting none");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_single_nested_match_ignoring_case() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("runs/a")).unwrap();
        fs::write(dir.path().join("runs/a/Emu_Solution_SUCCESS.sto"), "").unwrap();
        fs::write(dir.path().join("runs/a/emu.osim"), "").unwrap();

        let found = find_file_in_dir(dir.path(), "success.sto").unwrap();
        assert!(found.ends_with("Emu_Solution_SUCCESS.sto"));
    }

    #[test]
    fn no_match_is_none() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.sto"), "").unwrap();
        assert_eq!(find_file_in_dir(dir.path(), "success"), None);
    }

    #[test]
    fn several_matches_are_ambiguous() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a_success.sto"), "").unwrap();
        fs::write(dir.path().join("b/b_success.sto"), "").unwrap();

        let err = search_dir(dir.path(), "success").unwrap_err();
        assert_eq!(err.candidates.len(), 2);
        assert!(err.to_string().contains("2 files match"));
        assert_eq!(find_file_in_dir(dir.path(), "success"), None);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_does_not_duplicate_matches() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("run_success.sto"), "").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let found = search_dir(dir.path(), "success.sto").unwrap();
        assert_eq!(found, Some(dir.path().join("run_success.sto")));
    }
}
