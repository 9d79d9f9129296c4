//! Sandboxed runs; need a running docker daemon and pulled images

use judgebox::{Config, ExecutionRequest, ExecutionStatus, IsolationMethod, IsolationMode, Runner};

use super::{fixture_source, workspace_count};

fn sandboxed_runner(root: &std::path::Path) -> Runner {
    let mut config = Config::default();
    config.workspace_root = root.to_path_buf();
    config.isolation = IsolationMode::Sandboxed;
    Runner::new(config).unwrap()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn python_hello_world_in_container() {
    let root = tempfile::tempdir().unwrap();
    let result = sandboxed_runner(root.path())
        .execute(&ExecutionRequest::new(fixture_source("hello.py"), "python"))
        .await
        .unwrap();

    assert!(result.succeeded, "{result:?}");
    assert_eq!(result.stdout, "Hello, World!");
    assert_eq!(result.isolation, IsolationMethod::Sandboxed);
    assert_eq!(result.memory_estimate_kb, None);
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn cpp_compiles_inside_container() {
    let root = tempfile::tempdir().unwrap();
    let request = ExecutionRequest::new(fixture_source("hello.cpp"), "cpp");
    let result = sandboxed_runner(root.path()).execute(&request).await.unwrap();

    assert!(result.succeeded, "{result:?}");
    assert_eq!(result.stdout, "Hello, World!");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn compile_error_in_container_reports_compiler_output() {
    let root = tempfile::tempdir().unwrap();
    let request = ExecutionRequest::new(fixture_source("compile_error.cpp"), "cpp");
    let result = sandboxed_runner(root.path()).execute(&request).await.unwrap();

    assert!(!result.succeeded);
    assert_eq!(result.status, ExecutionStatus::CompilationFailed);
    assert!(result.stderr.contains("error"), "{}", result.stderr);
    assert!(result.stdout.is_empty());
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn container_has_no_network() {
    let root = tempfile::tempdir().unwrap();
    let source = "import socket\nsocket.create_connection(('1.1.1.1', 53), timeout=2)\n";
    let result = sandboxed_runner(root.path())
        .execute(&ExecutionRequest::new(source, "python"))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::RuntimeError);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn workspace_is_read_only_in_container() {
    let root = tempfile::tempdir().unwrap();
    let source = "open('main.py', 'a').write('x')\n";
    let result = sandboxed_runner(root.path())
        .execute(&ExecutionRequest::new(source, "python"))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::RuntimeError);
    assert!(result.stderr.contains("Read-only file system"), "{}", result.stderr);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn container_timeout() {
    let root = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.workspace_root = root.path().to_path_buf();
    config.isolation = IsolationMode::Sandboxed;
    config.languages.get_mut("python").unwrap().timeout_ms = 2_000;
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
    assert_eq!(workspace_count(root.path()), 0);
}
