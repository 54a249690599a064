//! Result of one analysis run.

use serde::{Deserialize, Serialize};

/// Captured outcome of running the analysis tool on one file.
///
/// Produced by the executor, stored verbatim in the result cache, and
/// returned verbatim to callers; a cache hit and a fresh run are
/// indistinguishable through this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Exit code of the tool. Negative on Unix when killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}
