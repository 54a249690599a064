//! Discovery of the files to check.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::{Error, Result};

/// Expand the configured glob patterns into a sorted, de-duplicated list
/// of absolute file paths. Matches are sorted per pattern, so the run
/// order is stable for a given configuration.
pub fn search_checked_files(config: &Config) -> Result<Vec<PathBuf>> {
    let mut checked = Vec::new();

    for pattern in &config.checked_file_patterns {
        let entries =
            glob::glob(pattern).map_err(|e| Error::Pattern(format!("{pattern}: {e}")))?;
        let mut matches: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .filter_map(|path| std::path::absolute(path).ok())
            .collect();
        matches.sort();
        checked.extend(matches);
    }

    let mut seen = HashSet::new();
    checked.retain(|path| seen.insert(path.clone()));
    Ok(checked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        for name in ["src/a.cpp", "src/b.cc", "src/notes.txt", "top.cpp"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        dir
    }

    fn config_with_patterns(dir: &tempfile::TempDir, patterns: &[&str]) -> Config {
        Config {
            checked_file_patterns: patterns
                .iter()
                .map(|p| dir.path().join(p).display().to_string())
                .collect(),
            ..Config::default()
        }
    }

    #[test]
    fn matches_only_requested_patterns() {
        let dir = project();
        let config = config_with_patterns(&dir, &["**/*.cpp"]);

        let files = search_checked_files(&config).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert!(names.contains(&"a.cpp".to_string()));
        assert!(names.contains(&"top.cpp".to_string()));
        assert!(!names.iter().any(|n| n.ends_with(".txt")));
        assert!(!names.iter().any(|n| n.ends_with(".cc")));
    }

    #[test]
    fn results_are_absolute_and_sorted_per_pattern() {
        let dir = project();
        let config = config_with_patterns(&dir, &["**/*.cpp"]);

        let files = search_checked_files(&config).unwrap();
        assert!(files.iter().all(|p| p.is_absolute()));
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }

    #[test]
    fn overlapping_patterns_do_not_duplicate() {
        let dir = project();
        let config = config_with_patterns(&dir, &["**/*.cpp", "**/a.cpp"]);

        let files = search_checked_files(&config).unwrap();
        let a_count = files
            .iter()
            .filter(|p| p.file_name().unwrap() == "a.cpp")
            .count();
        assert_eq!(a_count, 1);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let dir = project();
        let config = config_with_patterns(&dir, &["src/***"]);
        assert!(matches!(
            search_checked_files(&config).unwrap_err(),
            Error::Pattern(_)
        ));
    }
}
