//! Tool configuration.
//!
//! Loaded from a JSON file (`.lintcache.json` by default); every field has
//! a default so an empty file, or no file at all, yields a working
//! configuration. The CLI overlays its flags on top of the loaded values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file searched in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".lintcache.json";

pub const DEFAULT_CHECKED_FILE_PATTERNS: &[&str] =
    &["**/*.c", "**/*.cc", "**/*.cpp", "**/*.cxx"];

/// Which result-cache backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Single SQLite table with oldest-first eviction.
    #[default]
    Sqlite,
    /// Sharded per-entry files, unbounded.
    Files,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name or path of the clang-tidy executable.
    #[serde(default = "default_clang_tidy")]
    pub clang_tidy_executable: String,

    /// Build directory containing `compile_commands.json`.
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Glob patterns selecting the files to check.
    #[serde(default = "default_file_patterns", rename = "file_patterns")]
    pub checked_file_patterns: Vec<String>,

    /// Extra arguments appended to every clang-tidy invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Cache directory. Caching is disabled when absent.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default)]
    pub cache_backend: CacheBackend,

    /// Maximum entries kept by the SQLite backend; 0 disables eviction.
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: u64,

    /// Concurrent checks. Defaults to the machine's available parallelism.
    #[serde(default)]
    pub jobs: Option<usize>,

    #[serde(default = "default_true")]
    pub show_progress: bool,
}

fn default_clang_tidy() -> String {
    "clang-tidy".to_string()
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_file_patterns() -> Vec<String> {
    DEFAULT_CHECKED_FILE_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_max_cache_entries() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clang_tidy_executable: default_clang_tidy(),
            build_dir: default_build_dir(),
            checked_file_patterns: default_file_patterns(),
            extra_args: Vec::new(),
            cache_dir: None,
            cache_backend: CacheBackend::default(),
            max_cache_entries: default_max_cache_entries(),
            jobs: None,
            show_progress: true,
        }
    }
}

impl Config {
    /// Load configuration from the first existing candidate file.
    ///
    /// An explicitly given path is tried first, then [`DEFAULT_CONFIG_FILE`]
    /// in the working directory; when neither exists the defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        let candidates = explicit.into_iter().chain(std::iter::once(default.as_path()));

        for path in candidates {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                return serde_json::from_str(&content).map_err(|source| Error::Json {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
        Ok(Self::default())
    }

    /// Resolve the configuration for use: locate the analysis executable
    /// and replace the configured name with its real path.
    pub fn resolve(mut self) -> Result<Self> {
        let tool = find_tool(&self.clang_tidy_executable)?;
        self.clang_tidy_executable = tool.display().to_string();
        Ok(self)
    }

    /// Eviction limit for the SQLite backend; `None` means unbounded.
    pub fn eviction_limit(&self) -> Option<i64> {
        (self.max_cache_entries > 0).then_some(self.max_cache_entries as i64)
    }

    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        })
    }
}

/// Locate the analysis executable.
///
/// An existing path is taken as-is; otherwise PATH is searched. Symlink
/// chains are followed so the fingerprint of the toolchain is stable across
/// `clang-tidy` → `clang-tidy-18` style indirections.
pub fn find_tool(name_or_path: &str) -> Result<PathBuf> {
    let mut path = PathBuf::from(name_or_path);
    if !path.exists() {
        path = search_path(name_or_path)
            .ok_or_else(|| Error::ToolNotFound(name_or_path.to_string()))?;
    }

    while path.is_symlink() {
        path = std::fs::canonicalize(&path)?;
    }

    tracing::debug!("analysis tool found at {}", path.display());
    Ok(path)
}

fn search_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
