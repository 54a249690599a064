//! Check execution strategies: plain, or wrapped with the result cache.
//!
//! The strategy is picked once at setup: a configured cache directory
//! selects [`CachedTidyChecker`], otherwise every check runs the tool for
//! real. To callers the two are identical apart from latency.

use std::path::Path;

use async_trait::async_trait;

use crate::cache::{open_cache, ResultCache};
use crate::config::Config;
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::hasher::SourceHasher;
use crate::result::CheckResult;

/// Runs the analysis tool on one file.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Check one file. A non-zero exit code is a normal result.
    async fn check(&self, input_file: &Path) -> Result<CheckResult>;
}

/// Build the checker selected by the configuration.
pub fn build_checker(config: &Config) -> Result<Box<dyn Checker>> {
    match &config.cache_dir {
        Some(cache_dir) => {
            let cache = open_cache(config, cache_dir)?;
            Ok(Box::new(CachedTidyChecker::new(config.clone(), cache)?))
        }
        None => Ok(Box::new(TidyChecker::new(config.clone()))),
    }
}

/// Always runs clang-tidy for real.
pub struct TidyChecker {
    config: Config,
    executor: CommandExecutor,
}

impl TidyChecker {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            executor: CommandExecutor::new(),
        }
    }
}

#[async_trait]
impl Checker for TidyChecker {
    async fn check(&self, input_file: &Path) -> Result<CheckResult> {
        let mut command = vec![
            self.config.clang_tidy_executable.clone(),
            "--quiet".to_string(),
            "--warnings-as-errors=*".to_string(),
            "-p".to_string(),
            self.config.build_dir.display().to_string(),
        ];
        command.extend(self.config.extra_args.iter().cloned());
        command.push(input_file.display().to_string());

        let result = self
            .executor
            .execute(&command, Some(&self.config.build_dir))
            .await?;
        log_check_result(input_file, &result);
        Ok(result)
    }
}

/// Runs clang-tidy only when the file's fingerprint misses the cache.
pub struct CachedTidyChecker {
    checker: TidyChecker,
    hasher: SourceHasher,
    cache: Box<dyn ResultCache>,
}

impl CachedTidyChecker {
    pub fn new(config: Config, cache: Box<dyn ResultCache>) -> Result<Self> {
        let hasher = SourceHasher::new(&config)?;
        Ok(Self {
            checker: TidyChecker::new(config),
            hasher,
            cache,
        })
    }
}

#[async_trait]
impl Checker for CachedTidyChecker {
    async fn check(&self, input_file: &Path) -> Result<CheckResult> {
        let source_hash = self.hasher.calculate(input_file).await?;

        match self.cache.load(&source_hash).await {
            Ok(Some(result)) => {
                log_check_result(input_file, &result);
                return Ok(result);
            }
            Ok(None) => {}
            // A broken cache only costs time; run the real check instead
            // of failing the file.
            Err(e) => {
                tracing::warn!(
                    "cache lookup for {} failed, rerunning: {e}",
                    input_file.display()
                );
            }
        }

        let result = self.checker.check(input_file).await?;
        self.cache.save(&source_hash, &result).await?;
        Ok(result)
    }
}

fn log_check_result(input_file: &Path, result: &CheckResult) {
    if result.exit_code == 0 {
        tracing::info!(
            "check of {} finished with exit code 0",
            input_file.display()
        );
        if !result.stdout.is_empty() {
            tracing::debug!("{}", result.stdout);
        }
        if !result.stderr.is_empty() {
            tracing::debug!("{}", result.stderr);
        }
    } else {
        tracing::warn!(
            "check of {} finished with exit code {}\n{}\n{}",
            input_file.display(),
            result.exit_code,
            result.stdout,
            result.stderr
        );
    }
}
