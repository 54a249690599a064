//! Check driver: fans the configured checker out over the input files.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::checker::{build_checker, Checker};
use crate::config::Config;
use crate::error::Result;

/// Check every input file, reporting each completion through
/// `on_file_done` (presentation is the caller's concern).
///
/// Files run concurrently up to the configured job count; the pipeline for
/// a single file (fingerprint, cache lookup, real run) stays sequential.
/// Returns `true` when every file exited 0. The first hard error (missing
/// recipe, spawn failure, ...) aborts the run; checkers are dropped on the
/// way out, which kills any process still in flight.
pub async fn check_files<F>(config: &Config, input_files: &[PathBuf], on_file_done: F) -> Result<bool>
where
    F: Fn() + Send + Sync + 'static,
{
    let checker: Arc<dyn Checker> = Arc::from(build_checker(config)?);
    let semaphore = Arc::new(Semaphore::new(config.effective_jobs()));
    let on_file_done = Arc::new(on_file_done);

    let mut tasks = JoinSet::new();
    for file in input_files {
        let checker = Arc::clone(&checker);
        let semaphore = Arc::clone(&semaphore);
        let on_file_done = Arc::clone(&on_file_done);
        let file = file.clone();

        tasks.spawn(async move {
            let _permit = semaphore.acquire().await.unwrap();
            let result = checker.check(&file).await;
            on_file_done();
            result
        });
    }

    let mut all_passed = true;
    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(crate::error::Error::Join)??;
        if result.exit_code != 0 {
            all_passed = false;
        }
    }
    Ok(all_passed)
}
