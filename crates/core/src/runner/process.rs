//! Subprocess-backed runner implementation.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use crate::config::RunnerConfig;

use super::error::RunnerError;
use super::traits::CommandRunner;
use super::types::{ToolInvocation, ToolOutput};

/// Runs tools as child processes, streaming their output into the log.
pub struct ProcessRunner {
    config: RunnerConfig,
}

impl ProcessRunner {
    /// Creates a new runner with the given configuration.
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Creates a runner with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RunnerConfig::default())
    }

    fn not_found_or_io(program: &Path, e: std::io::Error) -> RunnerError {
        if e.kind() == std::io::ErrorKind::NotFound {
            RunnerError::NotFound {
                program: program.to_path_buf(),
            }
        } else {
            RunnerError::Io(e)
        }
    }
}

/// Resolves a program the way the OS would when spawning it.
///
/// Names containing a path separator are checked as-is; bare names are
/// searched for on `PATH`.
pub fn locate_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Reads a child pipe to EOF, passing each line to `on_line`.
///
/// Tools print file names and EXIF strings in whatever encoding the camera
/// used, so lines are decoded lossily. The pipe is drained even after a read
/// error: closing it early would kill the child with SIGPIPE.
async fn for_each_line<S, F>(stream: Option<S>, mut on_line: F)
where
    S: AsyncRead + Unpin,
    F: FnMut(String),
{
    let Some(stream) = stream else {
        return;
    };
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(['\n', '\r']).to_string());
            }
            Err(e) => {
                debug!(error = %e, "Pipe read failed, discarding remaining output");
                let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                break;
            }
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    fn name(&self) -> &str {
        "process"
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RunnerError> {
        let start = Instant::now();
        let tool = invocation.program_name().to_string();
        debug!(tool = %tool, args = ?invocation.args, "Spawning tool");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Self::not_found_or_io(&invocation.program, e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let tail_limit = self.config.stderr_tail_lines;

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let stdout_lines = for_each_line(stdout, |line| {
                debug!(tool = %tool, "{}", line);
            });

            let stderr_lines = async {
                let mut tail: VecDeque<String> = VecDeque::with_capacity(tail_limit);
                for_each_line(stderr, |line| {
                    debug!(tool = %tool, stream = "stderr", "{}", line);
                    if tail_limit == 0 {
                        return;
                    }
                    if tail.len() == tail_limit {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                })
                .await;
                tail
            };

            let ((), tail) = tokio::join!(stdout_lines, stderr_lines);

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, VecDeque<String>), std::io::Error>((status, tail))
        })
        .await;

        match result {
            Ok(Ok((status, tail))) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                if !status.success() {
                    // Killed by a signal: no exit code
                    let code = status.code().unwrap_or(-1);
                    let stderr = tail.into_iter().collect::<Vec<_>>().join("\n");
                    return Err(RunnerError::non_zero_exit(
                        invocation.program.clone(),
                        code,
                        stderr,
                    ));
                }
                info!(tool = %tool, duration_ms, "Tool finished");
                Ok(ToolOutput {
                    exit_code: 0,
                    duration_ms,
                })
            }
            Ok(Err(e)) => Err(RunnerError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                Err(RunnerError::Timeout {
                    program: invocation.program.clone(),
                    timeout_secs: self.config.timeout_secs,
                })
            }
        }
    }

    async fn validate(&self, program: &Path) -> Result<(), RunnerError> {
        match locate_program(program) {
            Some(resolved) => {
                debug!(program = %program.display(), resolved = %resolved.display(), "Located tool");
                Ok(())
            }
            None => Err(RunnerError::NotFound {
                program: program.to_path_buf(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> ToolInvocation {
        ToolInvocation::new("sh").arg("-c").arg(script)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_success() {
        let runner = ProcessRunner::with_defaults();
        let output = runner.run(&shell("echo hello; exit 0")).await.unwrap();
        assert_eq!(output.exit_code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_non_zero_exit_carries_code_and_stderr() {
        let runner = ProcessRunner::with_defaults();
        let err = runner
            .run(&shell("echo 'no images found' >&2; exit 3"))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), Some(3));
        assert!(err.stderr().unwrap().contains("no images found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_stderr_tail_is_bounded() {
        let config = RunnerConfig {
            stderr_tail_lines: 2,
            ..Default::default()
        };
        let runner = ProcessRunner::new(config);
        let err = runner
            .run(&shell("for i in 1 2 3 4 5; do echo line$i >&2; done; exit 1"))
            .await
            .unwrap_err();

        assert_eq!(err.stderr(), Some("line4\nline5"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_survives_non_utf8_output() {
        // A Latin-1 file name followed by more output than a pipe buffer holds.
        let runner = ProcessRunner::with_defaults();
        let script = "printf 'Image: caf\\351.jpg\\n'; \
                      i=0; while [ $i -lt 20000 ]; do echo \"feature line $i\"; i=$((i+1)); done; \
                      exit 0";
        let output = runner.run(&shell(script)).await.unwrap();
        assert_eq!(output.exit_code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_non_utf8_stderr_kept_in_tail() {
        let runner = ProcessRunner::with_defaults();
        let err = runner
            .run(&shell("printf 'cannot open caf\\351.jpg\\r\\n' >&2; exit 2"))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), Some(2));
        assert_eq!(err.stderr(), Some("cannot open caf\u{FFFD}.jpg"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_respects_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = ProcessRunner::with_defaults();
        runner
            .run(&shell("touch marker").current_dir(dir.path()))
            .await
            .unwrap();
        assert!(dir.path().join("marker").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_timeout_kills_child() {
        let config = RunnerConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        let runner = ProcessRunner::new(config);
        let err = runner.run(&shell("sleep 10")).await.unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { timeout_secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_run_missing_executable() {
        let runner = ProcessRunner::with_defaults();
        let err = runner
            .run(&ToolInvocation::new("openmvgo-definitely-not-installed"))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_validate() {
        let runner = ProcessRunner::with_defaults();
        assert!(runner.validate(Path::new("sh")).await.is_ok());
        assert!(runner
            .validate(Path::new("openmvgo-definitely-not-installed"))
            .await
            .is_err());
        assert!(runner
            .validate(Path::new("/nonexistent/bin/DensifyPointCloud"))
            .await
            .is_err());
    }
}
