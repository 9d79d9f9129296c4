use std::time::{Duration, Instant};

use judgebox::{ExecutionRequest, ExecutionStatus, IsolationMethod, Runner};

use super::{native_config, sh_runner, workspace_count};

#[tokio::test]
async fn infinite_loop_hits_time_limit() {
    let root = tempfile::tempdir().unwrap();
    let runner = sh_runner(root.path(), 300);

    let started = Instant::now();
    let result = runner
        .execute(&ExecutionRequest::new("while true; do :; done", "python"))
        .await
        .unwrap();

    assert!(!result.succeeded);
    assert_eq!(result.status, ExecutionStatus::TimeLimitExceeded);
    assert_eq!(result.exit_code, None);
    assert!(result.stderr.contains("Time limit exceeded"));
    assert!(result.elapsed_ms >= 300);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn background_children_die_with_the_program() {
    let root = tempfile::tempdir().unwrap();
    let runner = sh_runner(root.path(), 300);

    let started = Instant::now();
    let result = runner
        .execute(&ExecutionRequest::new("sleep 60 & sleep 60", "python"))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::TimeLimitExceeded);
    assert!(started.elapsed() < Duration::from_secs(5));
}

fn process_gone(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/status")) {
        Err(_) => true,
        Ok(status) => status
            .lines()
            .any(|line| line.starts_with("State:") && line.contains('Z')),
    }
}

#[tokio::test]
async fn timed_out_program_leaves_no_processes_behind() {
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let pid_file = scratch.path().join("pid");
    let runner = sh_runner(root.path(), 300);

    let source = format!("sleep 60 & echo $! > {}\nwait\n", pid_file.display());
    let result = runner
        .execute(&ExecutionRequest::new(source, "python"))
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::TimeLimitExceeded);

    let pid: i32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while !process_gone(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(process_gone(pid), "background child {pid} outlived the run");
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn stdin_is_streamed_and_closed() {
    let root = tempfile::tempdir().unwrap();
    let runner = sh_runner(root.path(), 5_000);

    let request = ExecutionRequest::new("read name; echo \"Hello $name\"; cat", "python")
        .with_stdin("World\nrest of input\n");
    let result = runner.execute(&request).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.stdout, "Hello World\nrest of input");
}

#[tokio::test]
async fn missing_stdin_reads_eof() {
    let root = tempfile::tempdir().unwrap();
    let runner = sh_runner(root.path(), 5_000);

    let result = runner
        .execute(&ExecutionRequest::new("cat; echo done", "python"))
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.stdout, "done");
}

#[tokio::test]
async fn output_is_capped() {
    let root = tempfile::tempdir().unwrap();
    let mut config = native_config(root.path());
    config.max_output_bytes = 1024;
    let python = config.languages.get_mut("python").unwrap();
    python.run = vec!["sh".to_string(), "{source}".to_string()];
    let runner = Runner::new(config).unwrap();

    let result = runner
        .execute(&ExecutionRequest::new("yes | head -c 100000", "python"))
        .await
        .unwrap();

    assert!(result.succeeded);
    assert!(result.stdout.len() <= 1024);
    assert!(result.stderr.contains("truncated"));
}

#[tokio::test]
async fn native_results_carry_isolation_tag() {
    let root = tempfile::tempdir().unwrap();
    let runner = sh_runner(root.path(), 5_000);

    let result = runner
        .execute(&ExecutionRequest::new("echo hi", "python"))
        .await
        .unwrap();

    assert_eq!(result.isolation, IsolationMethod::Native);
    assert!(result.is_native());
}

#[tokio::test]
async fn killed_by_signal_is_a_runtime_error() {
    let root = tempfile::tempdir().unwrap();
    let runner = sh_runner(root.path(), 5_000);

    let result = runner
        .execute(&ExecutionRequest::new("kill -SEGV $$", "python"))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::RuntimeError);
    assert_eq!(result.exit_code, None);
    assert!(result.stderr.contains("SIGSEGV"), "{}", result.stderr);
}
