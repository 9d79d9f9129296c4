//! Fallback executor
//!
//! Compiles and runs submissions as plain host processes when no container
//! runtime is available. Each child gets its own process group, a scrubbed
//! environment and the workspace as working directory, but there is no
//! OS-level isolation: results are tagged `native` so callers can warn.

use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::backend::ExecutionError;
use crate::backend::process::{ProcessOutput, ProcessSpec, run_process};
use crate::registry::LanguageProfile;
use crate::workspace::Workspace;

/// PATH used when the host has none
const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

#[derive(Debug, Clone)]
pub struct NativeExecutor {
    compile_timeout: Duration,
    max_output: usize,
}

impl NativeExecutor {
    pub fn new(compile_timeout: Duration, max_output: usize) -> Self {
        Self {
            compile_timeout,
            max_output,
        }
    }

    /// Compile (if needed) and run the submission on the host
    #[instrument(skip(self, workspace, profile, stdin), fields(workspace = %workspace.id(), language = %profile.id))]
    pub async fn run(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
        stdin: Option<&[u8]>,
    ) -> Result<ProcessOutput, ExecutionError> {
        let build_dir = workspace.path().to_string_lossy().into_owned();

        if let Some(compile) = profile.compile_command(&build_dir) {
            self.compile(workspace, profile, &compile).await?;
        }

        let run = profile.run_command(&build_dir);
        debug!(?run, "running program");

        let command = Self::command(&run, workspace, profile)?;
        let spec = ProcessSpec {
            stdin,
            timeout: profile.timeout,
            max_output: self.max_output,
            sample_memory: true,
        };
        let output = run_process(command, spec)
            .await
            .map_err(|e| ExecutionError::Failed {
                message: format!("failed to start '{}': {e}", run[0]),
            })?;

        if output.timed_out {
            info!(limit = ?profile.timeout, "process killed at time limit");
            return Err(ExecutionError::Timeout {
                limit: profile.timeout,
                elapsed: output.elapsed,
            });
        }

        debug!(
            exit_code = ?output.exit_code,
            elapsed = ?output.elapsed,
            peak_memory_kb = ?output.peak_memory_kb,
            "process exited"
        );
        Ok(output)
    }

    async fn compile(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
        compile: &[String],
    ) -> Result<(), ExecutionError> {
        debug!(?compile, "compiling");

        let command = Self::command(compile, workspace, profile)?;
        let spec = ProcessSpec {
            stdin: None,
            timeout: self.compile_timeout,
            max_output: self.max_output,
            sample_memory: false,
        };
        let output = run_process(command, spec)
            .await
            .map_err(|e| ExecutionError::Failed {
                message: format!("failed to start compiler '{}': {e}", compile[0]),
            })?;

        if output.timed_out {
            return Err(ExecutionError::CompilationFailed {
                stderr: format!(
                    "compilation timed out after {}ms",
                    self.compile_timeout.as_millis()
                ),
            });
        }

        if !output.success() {
            let mut stderr = output.combined_output();
            if stderr.is_empty() {
                stderr = format!("compiler exited with {}", output.exit_description());
            }
            debug!(exit_code = ?output.exit_code, "compilation failed");
            return Err(ExecutionError::CompilationFailed { stderr });
        }

        debug!(elapsed = ?output.elapsed, "compilation complete");
        Ok(())
    }

    fn command(
        argv: &[String],
        workspace: &Workspace,
        profile: &LanguageProfile,
    ) -> Result<Command, ExecutionError> {
        let (program, args) = argv.split_first().ok_or_else(|| ExecutionError::Failed {
            message: "empty command".to_string(),
        })?;

        let path = std::env::var("PATH").unwrap_or_else(|_| FALLBACK_PATH.to_string());

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(workspace.path())
            .env_clear()
            .env("PATH", path)
            .env("HOME", workspace.path())
            .env("LANG", "C.UTF-8")
            .envs(&profile.env);
        Ok(command)
    }
}
