//! lintcache CLI - check files with clang-tidy, caching results by the
//! semantic content of each translation unit.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use lintcache_core::{check_files, search_checked_files, Config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Cached clang-tidy runner
#[derive(Parser)]
#[command(name = "lintcache", version, about = "Cached clang-tidy runner")]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Build directory containing compile_commands.json
    #[arg(short, long)]
    build_dir: Option<PathBuf>,

    /// Checked file pattern (repeatable)
    #[arg(short, long = "pattern")]
    patterns: Vec<String>,

    /// Extra argument passed to clang-tidy (repeatable)
    #[arg(long = "extra-arg")]
    extra_args: Vec<String>,

    /// Cache directory (enables result caching)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Max concurrent checks (default: CPU cores)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(build_dir) = cli.build_dir {
        config.build_dir = build_dir;
    }
    if !cli.patterns.is_empty() {
        config.checked_file_patterns = cli.patterns;
    }
    if !cli.extra_args.is_empty() {
        config.extra_args = cli.extra_args;
    }
    if let Some(cache_dir) = cli.cache_dir {
        config.cache_dir = Some(cache_dir);
    }
    if cli.jobs.is_some() {
        config.jobs = cli.jobs;
    }
    if cli.no_progress {
        config.show_progress = false;
    }
    let config = config.resolve()?;

    let files = search_checked_files(&config)?;
    if files.is_empty() {
        println!("No files matched the configured patterns.");
        return Ok(());
    }

    let bar = if config.show_progress {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40} {pos}/{len} files",
        )?);
        bar
    } else {
        ProgressBar::hidden()
    };

    let progress = bar.clone();
    let all_passed = check_files(&config, &files, move || progress.inc(1)).await?;
    bar.finish_and_clear();

    if all_passed {
        println!("✅ No errors detected in {} files.", files.len());
        Ok(())
    } else {
        println!("❌ Some errors detected.");
        std::process::exit(1);
    }
}
