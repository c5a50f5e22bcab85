//! Types for the runner module.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

/// A single external tool invocation: program plus argument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Program name (looked up on PATH) or explicit path.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory for the child, inherited when unset.
    pub working_dir: Option<PathBuf>,
}

impl ToolInvocation {
    /// Creates an invocation with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Creates an invocation for `program`, resolved under `bin_dir` when given.
    pub fn in_bin_dir(bin_dir: Option<&Path>, program: &str) -> Self {
        match bin_dir {
            Some(dir) => Self::new(dir.join(program)),
            None => Self::new(program),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a path argument.
    pub fn arg_path(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Sets the child's working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// File name of the program, used for logs and mock matching.
    pub fn program_name(&self) -> &str {
        self.program
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
    }

    /// Returns the value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Outcome of a successful invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Exit code (always 0 for a successful run).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}
