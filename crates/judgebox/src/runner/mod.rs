//! Execution entry point
//!
//! Drives one submission through lookup, validation, workspace setup,
//! backend selection, execution and reporting, and tears the workspace
//! down on every path.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::backend::Backend;
use crate::config::{Config, ConfigError};
use crate::registry::{LanguageProfile, LanguageRegistry, UnsupportedLanguage};
use crate::report;
use crate::throttle::{AttemptLimiter, Throttled};
use crate::types::{ExecutionRequest, ExecutionResult, IsolationMethod};
use crate::validate::{InvalidSubmission, Validator};
use crate::workspace::{Workspace, WorkspaceError, WorkspaceManager};

/// File the request's stdin is written to, next to the source
pub const STDIN_FILE: &str = "stdin.txt";

/// Errors that prevent an execution from being attempted
///
/// Everything that happens once the program has been handed to a backend
/// (compile errors, timeouts, crashes) is reported through
/// [`ExecutionResult`] instead.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguage),

    #[error("invalid submission: {0}")]
    InvalidSubmission(#[from] InvalidSubmission),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Throttled(#[from] Throttled),
}

/// High-level runner for submissions
///
/// Cheap to clone; clones share the registry and the attempt limiter.
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<Config>,
    registry: Arc<LanguageRegistry>,
    validator: Validator,
    workspaces: WorkspaceManager,
    limiter: Option<AttemptLimiter>,
}

impl Runner {
    /// Create a runner from a validated configuration
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let registry = LanguageRegistry::from_config(&config)?;
        let limiter = config.throttle.as_ref().map(AttemptLimiter::from_config);
        Ok(Self {
            validator: Validator::new(config.max_source_chars),
            workspaces: WorkspaceManager::new(config.workspace_root.clone()),
            registry: Arc::new(registry),
            config: Arc::new(config),
            limiter,
        })
    }

    /// Create a runner with the embedded default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default()).expect("embedded default config should be valid")
    }

    /// Replace the attempt limiter, e.g. with one backed by a shared store
    pub fn with_limiter(mut self, limiter: AttemptLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn limiter(&self) -> Option<&AttemptLimiter> {
        self.limiter.as_ref()
    }

    /// Execute a submission on behalf of `key`, consulting the limiter first
    pub async fn execute_for(
        &self,
        key: &str,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, RunError> {
        if let Some(limiter) = &self.limiter {
            limiter.check(key)?;
        }
        self.execute(request).await
    }

    /// Execute a submission
    ///
    /// Rejections (unknown language, invalid source) happen before anything
    /// touches the filesystem.
    #[instrument(skip(self, request), fields(language = %request.language))]
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, RunError> {
        let profile = self.registry.lookup(&request.language)?;
        self.validator.validate(&request.source, profile.id)?;

        let mut workspace = self.workspaces.acquire().await?;
        if let Err(e) = prepare(&mut workspace, profile, request).await {
            workspace.release().await;
            return Err(e.into());
        }

        let result = self.run(&workspace, profile, request).await;
        workspace.release().await;

        info!(
            status = ?result.status,
            isolation = ?result.isolation,
            elapsed_ms = result.elapsed_ms,
            "execution finished"
        );
        Ok(result)
    }

    async fn run(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
        request: &ExecutionRequest,
    ) -> ExecutionResult {
        let backend = match Backend::select(&self.config).await {
            Ok(backend) => backend,
            // Only a forced sandbox can fail selection
            Err(e) => return report::format(Err(e), IsolationMethod::Sandboxed),
        };
        debug!(isolation = ?backend.isolation(), workspace = %workspace.id(), "backend selected");

        let stdin = request.stdin.as_deref().map(str::as_bytes);
        let outcome = backend.run(workspace, profile, stdin).await;
        report::format(outcome, backend.isolation())
    }
}

/// Write the source file, and the stdin file when there is input
async fn prepare(
    workspace: &mut Workspace,
    profile: &LanguageProfile,
    request: &ExecutionRequest,
) -> Result<(), WorkspaceError> {
    workspace
        .materialize(&profile.source_name, request.source.as_bytes())
        .await?;
    if let Some(stdin) = &request.stdin {
        workspace.materialize(STDIN_FILE, stdin.as_bytes()).await?;
    }
    Ok(())
}
