//! Result reporting
//!
//! Turns the raw outcome of an executor into the uniform [`ExecutionResult`]
//! handed back to callers.

use nix::sys::signal::Signal;

use crate::backend::{ExecutionError, ProcessOutput};
use crate::types::{ExecutionResult, ExecutionStatus, IsolationMethod};

/// Exit status the container client reports when the program got SIGKILL
const CONTAINER_KILLED_EXIT: i32 = 137;

const TRUNCATION_NOTE: &str = "[output truncated]";

/// Normalize an executor outcome
pub fn format(
    outcome: Result<ProcessOutput, ExecutionError>,
    isolation: IsolationMethod,
) -> ExecutionResult {
    let output = match outcome {
        Ok(output) => output,
        Err(ExecutionError::Timeout { limit, elapsed }) => {
            return ExecutionResult {
                elapsed_ms: millis(elapsed),
                ..ExecutionResult::failure(
                    ExecutionStatus::TimeLimitExceeded,
                    format!("Time limit exceeded ({}ms)", limit.as_millis()),
                    isolation,
                )
            };
        }
        Err(ExecutionError::CompilationFailed { stderr }) => {
            let message = match stderr.trim_end() {
                "" => "Compilation failed",
                trimmed => trimmed,
            };
            return ExecutionResult::failure(ExecutionStatus::CompilationFailed, message, isolation);
        }
        Err(ExecutionError::Failed { message }) => {
            return ExecutionResult::failure(
                ExecutionStatus::ExecutionFailed,
                message.trim_end(),
                isolation,
            );
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let mut stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();

    let status = match (output.timed_out, output.exit_code, output.signal) {
        // Executors turn timeouts into errors; a raw one is still honored
        (true, _, _) => {
            stderr = "Time limit exceeded".to_string();
            ExecutionStatus::TimeLimitExceeded
        }
        (false, Some(0), _) => ExecutionStatus::Success,
        (false, Some(code), _) => {
            if stderr.is_empty() {
                stderr = if code == CONTAINER_KILLED_EXIT && isolation == IsolationMethod::Sandboxed
                {
                    "Runtime error (killed, possibly out of memory)".to_string()
                } else {
                    "Runtime error".to_string()
                };
            }
            ExecutionStatus::RuntimeError
        }
        (false, None, Some(signal)) => {
            let killed = format!("Killed by signal {}", signal_name(signal));
            stderr = if stderr.is_empty() {
                killed
            } else {
                format!("{stderr}\n{killed}")
            };
            ExecutionStatus::RuntimeError
        }
        (false, None, None) => {
            stderr = "Execution ended without an exit status".to_string();
            ExecutionStatus::ExecutionFailed
        }
    };

    if output.truncated {
        if !stderr.is_empty() {
            stderr.push('\n');
        }
        stderr.push_str(TRUNCATION_NOTE);
    }

    ExecutionResult {
        succeeded: status == ExecutionStatus::Success,
        status,
        stdout,
        stderr,
        exit_code: if output.timed_out { None } else { output.exit_code },
        elapsed_ms: millis(output.elapsed),
        memory_estimate_kb: output.peak_memory_kb,
        isolation,
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn signal_name(signal: i32) -> String {
    Signal::try_from(signal)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| signal.to_string())
}
