//! Error type shared by the whole engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the check engine.
///
/// A non-zero exit code from the analysis tool is NOT an error; it is a
/// normal [`CheckResult`](crate::result::CheckResult). The variants here
/// cover the failures that abort a file's check instead of producing one.
#[derive(Debug, Error)]
pub enum Error {
    /// The checked file has no entry in `compile_commands.json`.
    #[error("{} is not found in compile_commands.json", .0.display())]
    MissingCompileCommand(PathBuf),

    /// The recorded compile command could not be tokenized.
    #[error("malformed compile command for {}", .0.display())]
    MalformedCompileCommand(PathBuf),

    /// The preprocessor exited non-zero while fingerprinting a file.
    #[error("failed to preprocess {}:\n{stderr}", .file.display())]
    Preprocess { file: PathBuf, stderr: String },

    /// The command could not be spawned at all (missing binary, bad
    /// working directory). Distinct from a command that ran and failed.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An empty argument list was passed to the executor.
    #[error("cannot execute an empty command")]
    EmptyCommand,

    /// The analysis executable was not found on disk or in PATH.
    #[error("failed to find {0} executable")]
    ToolNotFound(String),

    #[error("invalid glob pattern: {0}")]
    Pattern(String),

    #[error("cache database error: {0}")]
    CacheDb(#[from] rusqlite::Error),

    #[error("failed to encode cache entry: {0}")]
    CacheEncode(#[from] bincode::error::EncodeError),

    #[error("failed to decode cache entry: {0}")]
    CacheDecode(#[from] bincode::error::DecodeError),

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
