//! Level file validation.

use std::fmt;
use std::path::{Path, PathBuf};

use pathlock_core::error::{GameError, Result};
use pathlock_core::level::LevelData;

/// Outcome for one level file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// File that was checked.
    pub path: PathBuf,
    /// Level name, if the file parsed.
    pub name: Option<String>,
    /// Parse or validation failures, one per line.
    pub errors: Vec<String>,
}

impl FileReport {
    /// Whether the file parsed and validated cleanly.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome for every file checked in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Per-file results, sorted by path.
    pub files: Vec<FileReport>,
}

impl ValidationReport {
    /// Whether every file passed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.files.iter().all(FileReport::is_ok)
    }

    /// Files with at least one error.
    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.is_ok())
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            let name = file.name.as_deref().unwrap_or("?");
            if file.is_ok() {
                writeln!(f, "ok    {} ({name})", file.path.display())?;
            } else {
                writeln!(f, "FAIL  {} ({name})", file.path.display())?;
                for error in &file.errors {
                    writeln!(f, "        - {error}")?;
                }
            }
        }
        let failed = self.failures().count();
        write!(f, "{} file(s) checked, {failed} failed", self.files.len())
    }
}

/// Check a single level file.
#[must_use]
pub fn validate_level_file(path: &Path) -> FileReport {
    tracing::debug!(path = %path.display(), "Validating level");
    match LevelData::from_file(path) {
        Ok(data) => {
            let errors: Vec<String> = data.validate().iter().map(ToString::to_string).collect();
            for error in &errors {
                tracing::warn!(path = %path.display(), "{error}");
            }
            FileReport {
                path: path.to_path_buf(),
                name: Some(data.name),
                errors,
            }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "{e}");
            FileReport {
                path: path.to_path_buf(),
                name: None,
                errors: vec![e.to_string()],
            }
        }
    }
}

/// Check a level file, or every `.ron` file directly inside a directory.
///
/// # Errors
///
/// Returns an error if `path` does not exist or the directory cannot be read.
/// Bad level files are reported in the [`ValidationReport`], not as errors.
pub fn validate_levels(path: &Path) -> Result<ValidationReport> {
    let io_error = |e: std::io::Error| GameError::DataParseError {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let metadata = std::fs::metadata(path).map_err(io_error)?;
    if metadata.is_file() {
        return Ok(ValidationReport {
            files: vec![validate_level_file(path)],
        });
    }

    let mut level_files: Vec<PathBuf> = std::fs::read_dir(path)
        .map_err(io_error)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "ron"))
        .collect();
    level_files.sort();

    if level_files.is_empty() {
        tracing::warn!(path = %path.display(), "No level files found");
    }

    Ok(ValidationReport {
        files: level_files.iter().map(|p| validate_level_file(p)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathlock_core::goals::GoalType;
    use pathlock_test_utils::fixtures::LevelBuilder;
    use std::fs;

    fn good_level() -> String {
        LevelBuilder::open(4, 4)
            .name("good")
            .agent("a", (0, 0), 2)
            .agent("b", (3, 3), 2)
            .goal((3, 0), GoalType::Shared)
            .to_ron()
    }

    fn lonely_level() -> String {
        LevelBuilder::open(4, 4)
            .name("lonely")
            .agent("a", (0, 0), 2)
            .goal((3, 0), GoalType::Shared)
            .to_ron()
    }

    #[test]
    fn test_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("good.ron");
        fs::write(&path, good_level()).unwrap();

        let report = validate_levels(&path).unwrap();

        assert!(report.is_ok());
        assert_eq!(report.files[0].name.as_deref(), Some("good"));
    }

    #[test]
    fn test_directory_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a_good.ron"), good_level()).unwrap();
        fs::write(dir.path().join("b_lonely.ron"), lonely_level()).unwrap();
        fs::write(dir.path().join("c_broken.ron"), "(name: \"broken\", grid: ").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a level").unwrap();

        let report = validate_levels(dir.path()).unwrap();

        assert_eq!(report.files.len(), 3);
        assert!(!report.is_ok());
        assert!(report.files[0].is_ok());
        assert_eq!(report.files[1].errors, vec!["Level needs 2-4 agents, found 1".to_string()]);
        assert_eq!(report.files[2].name, None);
        assert!(report.files[2].errors[0].starts_with("Failed to parse data file"));
        assert_eq!(report.failures().count(), 2);
        assert!(report.to_string().ends_with("3 file(s) checked, 2 failed"));
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_levels(&dir.path().join("missing")).is_err());
    }
}
