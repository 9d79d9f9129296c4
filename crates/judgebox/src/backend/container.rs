//! Sandboxed executor
//!
//! Runs a submission in throwaway containers: no network, capped memory,
//! CPU and pids, read-only root and workspace, unprivileged user, all
//! capabilities dropped.
//!
//! Each phase (compile, then run) gets its own container, created first and
//! then started attached. Only the attached start is timed, so neither
//! container setup nor compilation counts against the run limit, and a
//! failed `create` is the only outcome attributed to the runtime itself.
//! Images are never pulled implicitly.

use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::backend::ExecutionError;
use crate::backend::process::{ProcessOutput, ProcessSpec, run_process};
use crate::config::ContainerConfig;
use crate::registry::LanguageProfile;
use crate::workspace::Workspace;

/// Workspace mount point inside the container
pub const CODE_DIR: &str = "/sandbox/code";

/// Compile artifacts, writable during compile and read-only during run
pub const BUILD_DIR: &str = "/sandbox/build";

/// Workspace subdirectory mounted at [`BUILD_DIR`]
const BUILD_SCRATCH: &str = "build";

const CREATE_TIMEOUT: Duration = Duration::from_secs(30);
const REMOVE_TIMEOUT: Duration = Duration::from_secs(10);
const PULL_TIMEOUT: Duration = Duration::from_secs(600);

/// Bytes of runtime CLI output kept for error messages
const RUNTIME_OUTPUT_CAP: usize = 64 * 1024;

/// Which container of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Compile,
    Run,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Compile => "compile",
            Phase::Run => "run",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContainerExecutor {
    config: ContainerConfig,
    compile_timeout: Duration,
    max_output: usize,
}

impl ContainerExecutor {
    pub fn new(config: ContainerConfig, compile_timeout: Duration, max_output: usize) -> Self {
        Self {
            config,
            compile_timeout,
            max_output,
        }
    }

    /// Container name for one phase; unique because workspace ids are
    pub fn container_name(workspace: &Workspace, phase: Phase) -> String {
        format!("judgebox-{}-{}", workspace.id(), phase.as_str())
    }

    /// Arguments to `<runtime> create` for one phase
    pub fn create_args(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
        phase: Phase,
    ) -> Vec<String> {
        let c = &self.config;
        let mut args: Vec<String> = vec![
            "create".into(),
            "--rm".into(),
            "--interactive".into(),
            "--pull=never".into(),
            format!("--name={}", Self::container_name(workspace, phase)),
            "--network=none".into(),
            format!("--memory={}m", c.memory_mb),
            format!("--memory-swap={}m", c.memory_mb),
            format!("--cpus={}", c.cpus),
            format!("--pids-limit={}", c.pids_limit),
            "--read-only".into(),
            format!("--user={}", c.user),
            "--cap-drop=ALL".into(),
            "--security-opt=no-new-privileges".into(),
            format!("--tmpfs=/tmp:rw,noexec,nosuid,size={}m", c.tmpfs_size_mb),
            format!(
                "--mount=type=bind,source={},target={CODE_DIR},readonly",
                workspace.path().display()
            ),
        ];

        if profile.is_compiled() {
            let access = match phase {
                Phase::Compile => "",
                Phase::Run => ",readonly",
            };
            args.push(format!(
                "--mount=type=bind,source={},target={BUILD_DIR}{access}",
                workspace.path().join(BUILD_SCRATCH).display()
            ));
        }

        args.push(format!("--workdir={CODE_DIR}"));
        args.push("--env=HOME=/tmp".into());

        let mut env: Vec<_> = profile.env.iter().collect();
        env.sort();
        for (key, value) in env {
            args.push(format!("--env={key}={value}"));
        }

        args.push("--entrypoint=/bin/sh".into());
        args.push(profile.image.clone());
        args.push("-c".into());
        args.push(entrypoint_script(profile, phase));
        args
    }

    /// Compile (if needed) and run the submission in fresh containers
    #[instrument(skip(self, workspace, profile, stdin), fields(workspace = %workspace.id(), language = %profile.id))]
    pub async fn run(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
        stdin: Option<&[u8]>,
    ) -> Result<ProcessOutput, ExecutionError> {
        if profile.is_compiled() {
            self.compile(workspace, profile).await?;
        }

        let output = self
            .phase(workspace, profile, Phase::Run, stdin, profile.timeout)
            .await?;
        debug!(
            exit_code = ?output.exit_code,
            elapsed = ?output.elapsed,
            "container exited"
        );
        Ok(output)
    }

    /// Fetch an image so executions never wait on a download
    #[instrument(skip(self))]
    pub async fn pull(&self, image: &str) -> Result<(), ExecutionError> {
        let mut command = Command::new(&self.config.runtime);
        command.args(["pull", image]);
        let spec = ProcessSpec {
            stdin: None,
            timeout: PULL_TIMEOUT,
            max_output: RUNTIME_OUTPUT_CAP,
            sample_memory: false,
        };
        let output = run_process(command, spec)
            .await
            .map_err(|e| ExecutionError::Failed {
                message: format!("failed to start container runtime: {e}"),
            })?;

        if output.success() {
            info!(image, "image pulled");
            return Ok(());
        }
        let reason = if output.timed_out {
            "timed out".to_string()
        } else {
            output.combined_output()
        };
        Err(ExecutionError::Failed {
            message: format!("failed to pull image '{image}': {reason}"),
        })
    }

    async fn compile(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
    ) -> Result<(), ExecutionError> {
        workspace
            .scratch_dir(BUILD_SCRATCH)
            .await
            .map_err(|e| ExecutionError::Failed {
                message: e.to_string(),
            })?;

        let output = match self
            .phase(workspace, profile, Phase::Compile, None, self.compile_timeout)
            .await
        {
            Ok(output) => output,
            Err(ExecutionError::Timeout { .. }) => {
                return Err(ExecutionError::CompilationFailed {
                    stderr: format!(
                        "compilation timed out after {}ms",
                        self.compile_timeout.as_millis()
                    ),
                });
            }
            Err(e) => return Err(e),
        };

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

    /// Create, start attached, and always remove one container
    async fn phase(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
        phase: Phase,
        stdin: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<ProcessOutput, ExecutionError> {
        let name = Self::container_name(workspace, phase);
        let result = self
            .create_and_start(&name, workspace, profile, phase, stdin, timeout)
            .await;
        // Idempotent; also stops a container whose client was killed
        self.remove(&name).await;
        result
    }

    async fn create_and_start(
        &self,
        name: &str,
        workspace: &Workspace,
        profile: &LanguageProfile,
        phase: Phase,
        stdin: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<ProcessOutput, ExecutionError> {
        self.create(workspace, profile, phase).await?;

        let mut command = Command::new(&self.config.runtime);
        command.args(["start", "--attach", "--interactive", name]);
        let spec = ProcessSpec {
            stdin,
            timeout,
            max_output: self.max_output,
            // Memory is accounted inside the container's cgroup, which is
            // gone by the time we could read it
            sample_memory: false,
        };
        let output = run_process(command, spec)
            .await
            .map_err(|e| ExecutionError::Failed {
                message: format!("failed to start container runtime: {e}"),
            })?;

        if output.timed_out {
            info!(phase = phase.as_str(), limit = ?timeout, "container killed at time limit");
            return Err(ExecutionError::Timeout {
                limit: timeout,
                elapsed: output.elapsed,
            });
        }
        // The exit status is the program's own from here on, 125 included
        Ok(output)
    }

    async fn create(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
        phase: Phase,
    ) -> Result<(), ExecutionError> {
        let args = self.create_args(workspace, profile, phase);
        debug!(?args, "creating container");

        let mut command = Command::new(&self.config.runtime);
        command.args(&args);
        let spec = ProcessSpec {
            stdin: None,
            timeout: CREATE_TIMEOUT,
            max_output: RUNTIME_OUTPUT_CAP,
            sample_memory: false,
        };
        let output = run_process(command, spec)
            .await
            .map_err(|e| ExecutionError::Failed {
                message: format!("failed to start container runtime: {e}"),
            })?;

        if output.timed_out {
            return Err(ExecutionError::Failed {
                message: format!(
                    "container runtime did not create a container within {}s",
                    CREATE_TIMEOUT.as_secs()
                ),
            });
        }
        if !output.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecutionError::Failed {
                message: format!(
                    "failed to create container from image '{}' (images are not pulled at run time): {}",
                    profile.image,
                    stderr.trim()
                ),
            });
        }
        Ok(())
    }

    async fn remove(&self, name: &str) {
        let mut command = Command::new(&self.config.runtime);
        command.args(["rm", "--force", name]);
        let spec = ProcessSpec {
            stdin: None,
            timeout: REMOVE_TIMEOUT,
            max_output: RUNTIME_OUTPUT_CAP,
            sample_memory: false,
        };

        match run_process(command, spec).await {
            Ok(output) if output.timed_out => warn!(name, "timed out removing container"),
            Ok(_) => {}
            Err(e) => warn!(name, error = %e, "failed to remove container"),
        }
    }
}

/// Shell script run as the container entrypoint
fn entrypoint_script(profile: &LanguageProfile, phase: Phase) -> String {
    match phase {
        // Artifacts stay removable by the host user after the run
        Phase::Compile => match profile.compile_command(BUILD_DIR) {
            Some(compile) => format!("umask 0 && exec {}", shell_join(&compile)),
            None => "true".to_string(),
        },
        Phase::Run => format!("exec {}", shell_join(&profile.run_command(BUILD_DIR))),
    }
}

fn shell_join(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote one argument for POSIX sh
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:+,@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
