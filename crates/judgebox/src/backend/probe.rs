//! Container runtime availability check

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Ask the container runtime for its server version
///
/// Returns false on spawn failure, non-zero exit or timeout. Not cached:
/// the daemon can come and go between requests.
#[instrument]
pub async fn sandbox_available(runtime: &Path, timeout: Duration) -> bool {
    let mut command = Command::new(runtime);
    command
        .args(["version", "--format", "{{.Server.Version}}"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, command.status()).await {
        Ok(Ok(status)) if status.success() => true,
        Ok(Ok(status)) => {
            debug!(code = ?status.code(), "container runtime not usable");
            false
        }
        Ok(Err(e)) => {
            debug!(error = %e, "container runtime not found");
            false
        }
        Err(_) => {
            warn!("container runtime probe timed out");
            false
        }
    }
}
