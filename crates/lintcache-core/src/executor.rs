//! Command executor with scoped process lifetimes.
//!
//! Every spawned child is tracked in a live-process map for as long as it
//! runs. Dropping the executor (or calling [`CommandExecutor::kill_all`])
//! force-kills everything still in the map, so abandoning a check mid-flight
//! never leaks an external process.

use std::collections::HashMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::error::{Error, Result};
use crate::result::CheckResult;

/// Runs external commands and captures their output.
///
/// Safe to share between concurrent `execute` calls; all of them register
/// their children in the same live-process map. The map lock is never held
/// across an await.
pub struct CommandExecutor {
    live: Mutex<HashMap<u64, Child>>,
    next_id: AtomicU64,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self {
            live: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Execute a command and wait for it to finish.
    ///
    /// Returns the exit code with both output streams fully captured.
    /// A non-zero exit code is a normal result; only a failure to spawn
    /// the process at all is an error.
    pub async fn execute(&self, command: &[String], cwd: Option<&Path>) -> Result<CheckResult> {
        let (program, args) = command.split_first().ok_or(Error::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            command: program.clone(),
            source,
        })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.lock().unwrap().insert(id, child);

        // Both pipes must drain concurrently or a chatty process can fill
        // one while we block on the other.
        let (stdout, stderr) = tokio::try_join!(drain(stdout_pipe), drain(stderr_pipe))?;

        // Only this call removes `id`, so the child is still present even
        // if kill_all fired while the pipes were draining.
        let mut child = self
            .live
            .lock()
            .unwrap()
            .remove(&id)
            .expect("child stays registered until its own execute call removes it");
        let status = child.wait().await?;

        Ok(CheckResult {
            exit_code: exit_code_of(status),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    /// Force-kill every process still in the live map.
    ///
    /// The in-flight `execute` calls observe the kill as an early EOF on
    /// the pipes and report the signal exit code as their result.
    pub fn kill_all(&self) {
        let mut live = self.live.lock().unwrap();
        for child in live.values_mut() {
            if let Err(e) = child.start_kill() {
                tracing::debug!("failed to kill child process: {e}");
            }
        }
    }

    /// Number of processes currently running.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CommandExecutor {
    fn drop(&mut self) {
        self.kill_all();
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let executor = CommandExecutor::new();
        let result = executor.execute(&cmd(&["echo", "hello"]), None).await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.stderr, "");
        assert_eq!(executor.live_count(), 0);
    }

    #[tokio::test]
    async fn captures_stderr() {
        let executor = CommandExecutor::new();
        let result = executor
            .execute(&cmd(&["sh", "-c", "echo oops >&2"]), None)
            .await
            .unwrap();

        assert_eq!(result.exit_code, 0);
        assert!(result.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_result_not_an_error() {
        let executor = CommandExecutor::new();
        let result = executor
            .execute(&cmd(&["sh", "-c", "exit 3"]), None)
            .await
            .unwrap();

        assert_eq!(result.exit_code, 3);
    }

    #[tokio::test]
    async fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().canonicalize().unwrap();

        let executor = CommandExecutor::new();
        let result = executor
            .execute(&cmd(&["sh", "-c", "pwd"]), Some(dir.path()))
            .await
            .unwrap();

        assert_eq!(result.stdout.trim(), canonical.display().to_string());
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let executor = CommandExecutor::new();
        let err = executor
            .execute(&cmd(&["lintcache-no-such-binary"]), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Spawn { .. }));
        assert_eq!(executor.live_count(), 0);
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let executor = CommandExecutor::new();
        let err = executor.execute(&[], None).await.unwrap_err();
        assert!(matches!(err, Error::EmptyCommand));
    }

    #[tokio::test]
    async fn kill_all_terminates_running_processes() {
        let executor = Arc::new(CommandExecutor::new());

        let task = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move { executor.execute(&cmd(&["sleep", "30"]), None).await })
        };

        // Wait until the child is registered before tearing the session down.
        while executor.live_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        executor.kill_all();

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("killed process must be reaped promptly")
            .unwrap()
            .unwrap();

        assert!(result.exit_code < 0, "expected signal exit, got {}", result.exit_code);
        assert_eq!(executor.live_count(), 0);
    }
}
