//! Native runs against real host toolchains

use judgebox::{ExecutionRequest, ExecutionStatus, Runner};

use super::{fixture_source, native_config, workspace_count};

fn runner(root: &std::path::Path) -> Runner {
    Runner::new(native_config(root)).unwrap()
}

#[tokio::test]
async fn python_hello_world() {
    let root = tempfile::tempdir().unwrap();
    let result = runner(root.path())
        .execute(&ExecutionRequest::new(fixture_source("hello.py"), "python"))
        .await
        .unwrap();

    assert!(result.succeeded, "{result:?}");
    assert_eq!(result.stdout, "Hello, World!");
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn python_reads_stdin() {
    let root = tempfile::tempdir().unwrap();
    let request = ExecutionRequest::new(fixture_source("echo_input.py"), "python").with_stdin("Ada\n");
    let result = runner(root.path()).execute(&request).await.unwrap();

    assert_eq!(result.stdout, "Hello Ada");
}

#[tokio::test]
async fn python_exception_is_runtime_error() {
    let root = tempfile::tempdir().unwrap();
    let result = runner(root.path())
        .execute(&ExecutionRequest::new(
            fixture_source("division_by_zero.py"),
            "python",
        ))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::RuntimeError);
    assert_eq!(result.exit_code, Some(1));
    assert!(result.stderr.contains("ZeroDivisionError"));
}

#[tokio::test]
async fn python_timeout() {
    let root = tempfile::tempdir().unwrap();
    let mut config = native_config(root.path());
    config.languages.get_mut("python").unwrap().timeout_ms = 1_000;
    let runner = Runner::new(config).unwrap();

    let result = runner
        .execute(&ExecutionRequest::new(
            fixture_source("infinite_loop.py"),
            "python",
        ))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::TimeLimitExceeded);
    assert_eq!(result.exit_code, None);
    assert!(result.elapsed_ms >= 1_000);
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn javascript_hello_world() {
    let root = tempfile::tempdir().unwrap();
    let result = runner(root.path())
        .execute(&ExecutionRequest::new(fixture_source("hello.js"), "javascript"))
        .await
        .unwrap();

    assert!(result.succeeded, "{result:?}");
    assert_eq!(result.stdout, "Hello, World!");
}

#[tokio::test]
async fn cpp_compile_and_run() {
    let root = tempfile::tempdir().unwrap();
    let result = runner(root.path())
        .execute(&ExecutionRequest::new(fixture_source("hello.cpp"), "cpp"))
        .await
        .unwrap();

    assert!(result.succeeded, "{result:?}");
    assert_eq!(result.stdout, "Hello, World!");
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn cpp_compile_error() {
    let root = tempfile::tempdir().unwrap();
    let result = runner(root.path())
        .execute(&ExecutionRequest::new(
            fixture_source("compile_error.cpp"),
            "cpp",
        ))
        .await
        .unwrap();

    assert!(!result.succeeded);
    assert_eq!(result.status, ExecutionStatus::CompilationFailed);
    assert!(result.stderr.contains("error"), "{}", result.stderr);
    assert!(result.stdout.is_empty());
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn c_sum_from_stdin() {
    let root = tempfile::tempdir().unwrap();
    let request = ExecutionRequest::new(fixture_source("sum.c"), "c").with_stdin("40 2\n");
    let result = runner(root.path()).execute(&request).await.unwrap();

    assert!(result.succeeded, "{result:?}");
    assert_eq!(result.stdout, "42");
}

#[tokio::test]
async fn c_nonzero_exit() {
    let root = tempfile::tempdir().unwrap();
    let result = runner(root.path())
        .execute(&ExecutionRequest::new(fixture_source("exit_code.c"), "c"))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::RuntimeError);
    assert_eq!(result.exit_code, Some(3));
    assert_eq!(result.stderr, "Runtime error");
}

#[tokio::test]
async fn java_hello_world() {
    let root = tempfile::tempdir().unwrap();
    let result = runner(root.path())
        .execute(&ExecutionRequest::new(fixture_source("Main.java"), "java"))
        .await
        .unwrap();

    assert!(result.succeeded, "{result:?}");
    assert_eq!(result.stdout, "Hello, World!");
}

#[tokio::test]
async fn repeated_runs_give_identical_output() {
    let root = tempfile::tempdir().unwrap();
    let runner = runner(root.path());
    let request = ExecutionRequest::new(fixture_source("hello.py"), "python");

    let first = runner.execute(&request).await.unwrap();
    let second = runner.execute(&request).await.unwrap();

    assert_eq!(first.status, second.status);
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(first.exit_code, second.exit_code);
    assert_eq!(workspace_count(root.path()), 0);
}
