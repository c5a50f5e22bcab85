//! Trait definitions for the runner module.

use async_trait::async_trait;

use super::error::RunnerError;
use super::types::{ToolInvocation, ToolOutput};

/// Executes external programs on behalf of the pipeline stages.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Runs the invocation to completion.
    ///
    /// Blocks (asynchronously) until the child exits. A zero exit status is
    /// success; anything else is an error carrying the status.
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RunnerError>;

    /// Checks that the program can be located without running it.
    async fn validate(&self, program: &std::path::Path) -> Result<(), RunnerError>;
}
