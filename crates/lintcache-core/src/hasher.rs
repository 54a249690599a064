//! Semantic source fingerprinting.
//!
//! The cache key for a translation unit is the SHA3-512 hash of its
//! *preprocessed* form: the compile command recorded for the file is replayed
//! with `-E` so the compiler expands includes and macros to stdout, and that
//! output is hashed. Formatting, comments, and macro text that disappears
//! after expansion never change the key; any edit that survives
//! preprocessing (including edits in transitively included headers or in the
//! compiler flags) does.

use std::path::Path;

use base64::Engine;
use sha3::{Digest, Sha3_512};

use crate::compile_db::CompilationDatabase;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::CommandExecutor;

/// Calculates content hashes of source files as they would be compiled.
///
/// Owns its own [`CommandExecutor`], so dropping the hasher kills any
/// preprocessor still running.
pub struct SourceHasher {
    executor: CommandExecutor,
    compile_db: CompilationDatabase,
}

impl SourceHasher {
    /// Create a hasher for the project described by `config`.
    ///
    /// Reads `compile_commands.json` from the build directory once.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            executor: CommandExecutor::new(),
            compile_db: CompilationDatabase::load(&config.build_dir)?,
        })
    }

    /// Calculate the fingerprint of one source file.
    ///
    /// Identical file, compile command, and toolchain state always produce
    /// the identical string.
    pub async fn calculate(&self, input_file: &Path) -> Result<String> {
        let absolute = std::path::absolute(input_file)?;
        let entry = self
            .compile_db
            .lookup(&absolute)
            .ok_or_else(|| Error::MissingCompileCommand(absolute.clone()))?;

        let command = preprocess_args(entry.tokens()?);

        let result = self.executor.execute(&command, Some(&entry.directory)).await?;
        if result.exit_code != 0 {
            tracing::error!("failed to preprocess {}", input_file.display());
            tracing::error!("{}", result.stderr);
            return Err(Error::Preprocess {
                file: input_file.to_path_buf(),
                stderr: result.stderr,
            });
        }

        // Preprocessed output of a large TU can run to megabytes; hash it
        // off the runtime so other files keep fingerprinting meanwhile.
        let stdout = result.stdout;
        Ok(tokio::task::spawn_blocking(move || hash_bytes(stdout.as_bytes())).await?)
    }

    /// Force-kill any preprocessor still running.
    pub fn kill_all(&self) {
        self.executor.kill_all();
    }
}

/// Turn a recorded compile command into its preprocess-to-stdout form:
/// the first `-o <path>` pair is dropped and `-E` appended.
fn preprocess_args(mut args: Vec<String>) -> Vec<String> {
    if let Some(index) = args.iter().position(|arg| arg == "-o") {
        let end = (index + 2).min(args.len());
        args.drain(index..end);
    }
    args.push("-E".to_string());
    args
}

/// SHA3-512 of the input, URL-safe base64 without padding (86 chars).
///
/// Pure and synchronous; safe to run on a blocking thread.
fn hash_bytes(bytes: &[u8]) -> String {
    let digest = Sha3_512::digest(bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}
