//! Child process supervision
//!
//! Spawns a command in its own process group, feeds stdin, drains stdout and
//! stderr concurrently into capped buffers, and enforces a wall-clock
//! deadline by killing the whole group.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long to keep draining pipes after the process has exited
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Interval between peak-memory samples
const MEMORY_SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// Parameters for one supervised run
#[derive(Debug, Clone)]
pub struct ProcessSpec<'a> {
    /// Data written to stdin before it is closed; None connects /dev/null
    pub stdin: Option<&'a [u8]>,
    pub timeout: Duration,
    /// Bytes kept per stream
    pub max_output: usize,
    /// Sample VmHWM from /proc while the process runs
    pub sample_memory: bool,
}

/// Raw outcome of a supervised process
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code if the process exited normally and was not killed for time
    pub exit_code: Option<i32>,
    /// Signal number if the process was killed by a signal
    pub signal: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
    /// Highest VmHWM seen, in kilobytes
    pub peak_memory_kb: Option<u64>,
    pub timed_out: bool,
    /// Output beyond `max_output` was discarded
    pub truncated: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// stdout and stderr joined, for compiler diagnostics
    pub fn combined_output(&self) -> String {
        let stdout = String::from_utf8_lossy(&self.stdout);
        let stderr = String::from_utf8_lossy(&self.stderr);
        let mut combined = stdout.trim_end().to_string();
        if !combined.is_empty() && !stderr.trim().is_empty() {
            combined.push('\n');
        }
        combined.push_str(stderr.trim_end());
        combined
    }

    /// How the process ended, for messages
    pub fn exit_description(&self) -> String {
        match (self.exit_code, self.signal) {
            (Some(code), _) => format!("code {code}"),
            (None, Some(signal)) => format!("signal {signal}"),
            (None, None) => "unknown status".to_string(),
        }
    }
}

/// Run a prepared command to completion under `spec`
///
/// The caller configures program, arguments, working directory and
/// environment; stdio, process group and kill-on-drop are set here.
pub async fn run_process(mut command: Command, spec: ProcessSpec<'_>) -> io::Result<ProcessOutput> {
    command
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = command.spawn()?;
    let pid = child.id();

    if let (Some(mut pipe), Some(data)) = (child.stdin.take(), spec.stdin) {
        let data = data.to_vec();
        tokio::spawn(async move {
            // The program may exit without reading its input
            if let Err(e) = pipe.write_all(&data).await
                && e.kind() != io::ErrorKind::BrokenPipe
            {
                debug!(error = %e, "failed to write stdin");
            }
            let _ = pipe.shutdown().await;
        });
    }

    let stdout_task = child
        .stdout
        .take()
        .map(|pipe| tokio::spawn(read_capped(pipe, spec.max_output)));
    let stderr_task = child
        .stderr
        .take()
        .map(|pipe| tokio::spawn(read_capped(pipe, spec.max_output)));

    let peak = Arc::new(AtomicU64::new(0));
    let sampler = match pid {
        Some(pid) if spec.sample_memory => Some(tokio::spawn(sample_peak_memory(pid, peak.clone()))),
        _ => None,
    };

    let (status, timed_out) = match tokio::time::timeout(spec.timeout, child.wait()).await {
        Ok(status) => (status?, false),
        Err(_) => {
            debug!(?pid, timeout = ?spec.timeout, "deadline reached, killing process group");
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            let _ = child.start_kill();
            (child.wait().await?, true)
        }
    };
    let elapsed = start.elapsed();

    if let Some(sampler) = sampler {
        sampler.abort();
    }
    // Reap anything the program left running in its group
    if let Some(pid) = pid {
        kill_process_group(pid);
    }

    let (stdout, stdout_truncated) = collect(stdout_task, "stdout").await;
    let (stderr, stderr_truncated) = collect(stderr_task, "stderr").await;

    let peak_memory_kb = match peak.load(Ordering::Relaxed) {
        0 => None,
        kb => Some(kb),
    };

    Ok(ProcessOutput {
        exit_code: if timed_out { None } else { status.code() },
        signal: status.signal(),
        stdout,
        stderr,
        elapsed,
        peak_memory_kb,
        timed_out,
        truncated: stdout_truncated || stderr_truncated,
    })
}

/// SIGKILL every process in the group led by `pid`
pub fn kill_process_group(pid: u32) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid, error = %e, "failed to kill process group"),
    }
}

async fn read_capped<R>(mut reader: R, cap: usize) -> io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        // Keep draining past the cap so the writer never blocks on a full pipe
        let room = cap.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..n.min(room)]);
        if n > room {
            truncated = true;
        }
    }

    Ok((buf, truncated))
}

async fn collect(
    task: Option<JoinHandle<io::Result<(Vec<u8>, bool)>>>,
    stream: &'static str,
) -> (Vec<u8>, bool) {
    let Some(mut task) = task else {
        return (Vec::new(), false);
    };
    match tokio::time::timeout(PIPE_DRAIN_GRACE, &mut task).await {
        Ok(Ok(Ok(captured))) => captured,
        Ok(Ok(Err(e))) => {
            warn!(stream, error = %e, "failed to read process output");
            (Vec::new(), false)
        }
        Ok(Err(e)) => {
            warn!(stream, error = %e, "output reader task failed");
            (Vec::new(), false)
        }
        Err(_) => {
            // A descendant outside the process group still holds the pipe
            warn!(stream, "output pipe still open after exit, discarding");
            task.abort();
            (Vec::new(), true)
        }
    }
}

async fn sample_peak_memory(pid: u32, peak: Arc<AtomicU64>) {
    let status_path = format!("/proc/{pid}/status");
    loop {
        let Ok(status) = tokio::fs::read_to_string(&status_path).await else {
            break;
        };
        if let Some(kb) = parse_vm_hwm(&status) {
            peak.fetch_max(kb, Ordering::Relaxed);
        }
        tokio::time::sleep(MEMORY_SAMPLE_INTERVAL).await;
    }
}

/// Extract VmHWM (peak resident set size, kB) from /proc/<pid>/status
fn parse_vm_hwm(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmHWM:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}
