use serde::{Deserialize, Serialize};

/// A submission to execute
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionRequest {
    /// Source code of the submission
    pub source: String,

    /// Language id (python, javascript, java, cpp, c)
    pub language: String,

    /// Data fed to the program's standard input
    #[serde(default)]
    pub stdin: Option<String>,
}

impl ExecutionRequest {
    pub fn new(source: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            language: language.into(),
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

/// Which executor produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMethod {
    /// Locked-down container
    Sandboxed,
    /// Host child process, no OS-level isolation
    Native,
}

/// Outcome class of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Program exited with code 0
    Success,

    /// Non-zero exit or killed by a signal
    RuntimeError,

    /// Compile step exited non-zero
    CompilationFailed,

    /// Wall-clock limit exceeded; the process was killed
    TimeLimitExceeded,

    /// The program could not be started, or the result was inconsistent
    ExecutionFailed,
}

/// Result of an execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub succeeded: bool,

    pub status: ExecutionStatus,

    /// Standard output, trailing whitespace trimmed
    pub stdout: String,

    /// Standard error (or a synthesized message), trailing whitespace trimmed
    pub stderr: String,

    /// Exit code if the program exited normally; None on timeout
    pub exit_code: Option<i32>,

    /// Wall clock time from launch to exit in milliseconds
    pub elapsed_ms: u64,

    /// Approximate peak memory in kilobytes. This is a sampled estimate,
    /// not an accounting figure, and None when it could not be observed.
    pub memory_estimate_kb: Option<u64>,

    pub isolation: IsolationMethod,
}

impl ExecutionResult {
    /// Build a failed result with no process output
    pub fn failure(
        status: ExecutionStatus,
        message: impl Into<String>,
        isolation: IsolationMethod,
    ) -> Self {
        Self {
            succeeded: false,
            status,
            stdout: String::new(),
            stderr: message.into(),
            exit_code: None,
            elapsed_ms: 0,
            memory_estimate_kb: None,
            isolation,
        }
    }

    /// Check if the execution was successful (exited with code 0)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.succeeded && self.status == ExecutionStatus::Success && self.exit_code == Some(0)
    }

    /// Whether the result came from the weaker native path
    pub fn is_native(&self) -> bool {
        self.isolation == IsolationMethod::Native
    }
}
