//! Compilation database (`compile_commands.json`) access.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// One entry of the compilation database.
///
/// Real-world databases record the compiler invocation either as a single
/// shell string (`command`) or as a pre-split list (`arguments`); both
/// forms are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileCommand {
    pub file: PathBuf,
    pub directory: PathBuf,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
}

impl CompileCommand {
    /// Tokenized compiler invocation, shell quoting respected.
    pub fn tokens(&self) -> Result<Vec<String>> {
        if let Some(arguments) = &self.arguments {
            return Ok(arguments.clone());
        }
        let command = self.command.as_deref().unwrap_or_default();
        shlex::split(command).ok_or_else(|| Error::MalformedCompileCommand(self.file.clone()))
    }
}

/// Read-only view of `compile_commands.json`, keyed by the recorded
/// (absolute) file path. At most one entry per path; later duplicates
/// replace earlier ones.
#[derive(Debug)]
pub struct CompilationDatabase {
    commands: HashMap<PathBuf, CompileCommand>,
}

impl CompilationDatabase {
    /// Load `compile_commands.json` from a build directory.
    pub fn load(build_dir: &Path) -> Result<Self> {
        let path = build_dir.join("compile_commands.json");
        let content = std::fs::read_to_string(&path)?;
        let entries: Vec<CompileCommand> =
            serde_json::from_str(&content).map_err(|source| Error::Json { path, source })?;

        let commands = entries
            .into_iter()
            .map(|entry| (entry.file.clone(), entry))
            .collect();
        Ok(Self { commands })
    }

    /// Look up the entry for a file by exact path match.
    pub fn lookup(&self, absolute_file: &Path) -> Option<&CompileCommand> {
        self.commands.get(absolute_file)
    }
}
