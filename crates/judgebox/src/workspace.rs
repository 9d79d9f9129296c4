//! Per-execution workspace directories
//!
//! Every execution gets its own directory under the configured root, named
//! with a random token. Nothing is shared between executions, so no locking
//! is needed on the root.

use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Errors that occur while provisioning a workspace
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid file name: {0}")]
    InvalidPath(String),
}

/// Creates workspaces under a shared root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, uniquely named workspace directory
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn acquire(&self) -> Result<Workspace, WorkspaceError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: self.root.clone(),
                source,
            })?;

        let id = Uuid::new_v4().simple().to_string();
        let path = self.root.join(format!("run-{id}"));

        // create_dir fails on an existing path, so a collision can never
        // hand the same directory to two executions
        tokio::fs::create_dir(&path)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: path.clone(),
                source,
            })?;

        let workspace = Workspace {
            id,
            path,
            files: Vec::new(),
            released: false,
        };

        // The container user is unprivileged and needs to traverse and read
        tokio::fs::set_permissions(&workspace.path, Permissions::from_mode(0o755))
            .await
            .map_err(|source| WorkspaceError::Create {
                path: workspace.path.clone(),
                source,
            })?;

        debug!(id = %workspace.id, path = %workspace.path.display(), "workspace acquired");
        Ok(workspace)
    }
}

/// A directory owned by exactly one execution
///
/// # Cleanup
///
/// Call [`release()`](Self::release) when the execution ends. If a workspace
/// is dropped without being released (a panic, or the future being
/// cancelled), `Drop` removes the directory synchronously instead.
#[derive(Debug)]
pub struct Workspace {
    id: String,
    path: PathBuf,
    files: Vec<PathBuf>,
    released: bool,
}

impl Workspace {
    /// Unique token for this workspace
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Files written through [`materialize`](Self::materialize)
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Get the host path to a file inside the workspace
    ///
    /// Returns an error if the name would escape the workspace.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        if name.is_empty() || name.contains("..") || name.starts_with('/') {
            return Err(WorkspaceError::InvalidPath(format!(
                "path traversal not allowed: {name}"
            )));
        }
        Ok(self.path.join(name))
    }

    /// Write a file into the workspace and return its path
    #[instrument(skip(self, content), fields(workspace = %self.id))]
    pub async fn materialize(
        &mut self,
        name: &str,
        content: &[u8],
    ) -> Result<PathBuf, WorkspaceError> {
        let path = self.file_path(name)?;
        let write_err = |source| WorkspaceError::Write {
            path: path.clone(),
            source,
        };

        tokio::fs::write(&path, content).await.map_err(write_err)?;
        tokio::fs::set_permissions(&path, Permissions::from_mode(0o644))
            .await
            .map_err(write_err)?;

        debug!(path = %path.display(), len = content.len(), "wrote file to workspace");
        self.files.push(path.clone());
        Ok(path)
    }

    /// Create a subdirectory any user can write to
    ///
    /// Holds compile artifacts written by the unprivileged container user.
    pub async fn scratch_dir(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        let path = self.file_path(name)?;
        let create_err = |source| WorkspaceError::Create {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir(&path).await.map_err(create_err)?;
        tokio::fs::set_permissions(&path, Permissions::from_mode(0o777))
            .await
            .map_err(create_err)?;

        debug!(path = %path.display(), "created scratch directory");
        Ok(path)
    }

    /// Remove the workspace directory recursively
    ///
    /// Failures are logged and swallowed; cleanup never fails an execution.
    #[instrument(skip(self), fields(workspace = %self.id))]
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!("workspace released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove workspace"),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(
            workspace = %self.id,
            path = %self.path.display(),
            "workspace dropped without release, removing synchronously"
        );
        if let Err(e) = std::fs::remove_dir_all(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %e, "failed to remove workspace");
        }
    }
}
