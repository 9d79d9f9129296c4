//! Execution backends
//!
//! Two executors share one contract: the container-based sandbox, and a
//! native fallback used when no container runtime answers the probe.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

pub use crate::backend::container::{ContainerExecutor, Phase};
pub use crate::backend::native::NativeExecutor;
pub use crate::backend::probe::sandbox_available;
pub use crate::backend::process::{ProcessOutput, ProcessSpec, kill_process_group, run_process};
use crate::config::{Config, IsolationMode};
use crate::registry::LanguageProfile;
use crate::types::IsolationMethod;
use crate::workspace::Workspace;

mod container;
mod native;
mod probe;
mod process;

/// Errors that end an execution without a normal exit
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("compilation failed: {stderr}")]
    CompilationFailed { stderr: String },

    #[error("time limit of {}ms exceeded", limit.as_millis())]
    Timeout { limit: Duration, elapsed: Duration },

    #[error("execution failed: {message}")]
    Failed { message: String },
}

/// The executor chosen for one request
#[derive(Debug, Clone)]
pub enum Backend {
    Sandboxed(ContainerExecutor),
    Native(NativeExecutor),
}

impl Backend {
    /// Pick a backend according to the configured isolation mode
    ///
    /// In `auto` mode the container runtime is probed on every call.
    pub async fn select(config: &Config) -> Result<Self, ExecutionError> {
        let sandboxed = || {
            Backend::Sandboxed(ContainerExecutor::new(
                config.container.clone(),
                config.compile_timeout(),
                config.max_output_bytes,
            ))
        };
        let native = || {
            Backend::Native(NativeExecutor::new(
                config.compile_timeout(),
                config.max_output_bytes,
            ))
        };
        let runtime = &config.container.runtime;
        let probe_timeout = config.container.probe_timeout();

        match config.isolation {
            IsolationMode::Native => Ok(native()),
            IsolationMode::Sandboxed => {
                if sandbox_available(runtime, probe_timeout).await {
                    Ok(sandboxed())
                } else {
                    Err(ExecutionError::Failed {
                        message: format!(
                            "container runtime '{}' is unavailable",
                            runtime.display()
                        ),
                    })
                }
            }
            IsolationMode::Auto => {
                if sandbox_available(runtime, probe_timeout).await {
                    debug!("container runtime available");
                    Ok(sandboxed())
                } else {
                    warn!("container runtime unavailable, falling back to native execution");
                    Ok(native())
                }
            }
        }
    }

    pub fn isolation(&self) -> IsolationMethod {
        match self {
            Backend::Sandboxed(_) => IsolationMethod::Sandboxed,
            Backend::Native(_) => IsolationMethod::Native,
        }
    }

    /// Compile and run the materialized source
    pub async fn run(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
        stdin: Option<&[u8]>,
    ) -> Result<ProcessOutput, ExecutionError> {
        match self {
            Backend::Sandboxed(executor) => executor.run(workspace, profile, stdin).await,
            Backend::Native(executor) => executor.run(workspace, profile, stdin).await,
        }
    }
}
