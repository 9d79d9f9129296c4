//! Sandboxed execution core for a student coding judge.
//!
//! Judgebox takes a submission (`source`, `language`, optional `stdin`),
//! validates it, writes it into a private workspace, compiles and runs it in
//! a locked-down container (or as a native child process when no container
//! runtime is available), and returns a uniform [`ExecutionResult`].
//!
//! # Features
//!
//! - **Container sandbox**: no network, capped memory, CPU and pids, read-only filesystem, unprivileged user.
//! - **Native fallback**: process-group isolation and wall-clock limits when no runtime answers.
//! - **Five languages**: Python, JavaScript, Java, C++ and C, overridable via TOML.
//! - **Source checks**: size limit and a denylist of OS escape primitives.
//! - **Attempt throttling**: optional per-key sliding window.
//!
//! ```no_run
//! use judgebox::{ExecutionRequest, Runner};
//!
//! # async fn demo() -> Result<(), judgebox::RunError> {
//! let runner = Runner::with_defaults();
//! let result = runner
//!     .execute(&ExecutionRequest::new("print('Hello, World!')", "python"))
//!     .await?;
//! assert_eq!(result.stdout, "Hello, World!");
//! # Ok(())
//! # }
//! ```

pub use backend::{Backend, ExecutionError, sandbox_available};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG, IsolationMode, LanguageId};
pub use registry::{LanguageProfile, LanguageRegistry, UnsupportedLanguage};
pub use runner::{RunError, Runner};
pub use throttle::{AttemptLimiter, AttemptStore, InMemoryAttemptStore, Throttled};
pub use types::{ExecutionRequest, ExecutionResult, ExecutionStatus, IsolationMethod};
pub use validate::{InvalidSubmission, Validator};
pub use workspace::{Workspace, WorkspaceError, WorkspaceManager};

pub mod backend;
pub mod config;
pub mod registry;
pub mod report;
pub mod runner;
pub mod throttle;
pub mod types;
pub mod validate;
pub mod workspace;
