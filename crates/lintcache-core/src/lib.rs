//! lintcache core - cached clang-tidy execution engine
//!
//! The pipeline for one file:
//! - Fingerprint the translation unit by replaying its compile command
//!   with `-E` and hashing the preprocessed output (SHA3-512)
//! - Look the fingerprint up in the result cache (SQLite table or sharded
//!   files, chosen by configuration)
//! - On a miss, run clang-tidy for real and store the result
//!
//! External processes run through a shared executor that tracks every live
//! child and kills them all when the scope is dropped, so no analysis or
//! preprocessor process outlives its caller.

pub mod cache;
pub mod check;
pub mod checker;
pub mod compile_db;
pub mod config;
pub mod discover;
pub mod error;
pub mod executor;
pub mod hasher;
pub mod result;

pub use cache::{open_cache, ResultCache, ShardedFileCache, SqliteResultCache};
pub use check::check_files;
pub use checker::{build_checker, CachedTidyChecker, Checker, TidyChecker};
pub use compile_db::{CompilationDatabase, CompileCommand};
pub use config::{CacheBackend, Config, DEFAULT_CONFIG_FILE};
pub use discover::search_checked_files;
pub use error::{Error, Result};
pub use executor::CommandExecutor;
pub use hasher::SourceHasher;
pub use result::CheckResult;
