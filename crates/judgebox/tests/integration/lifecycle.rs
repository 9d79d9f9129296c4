use std::collections::HashSet;

use judgebox::{ExecutionRequest, ExecutionStatus, WorkspaceManager};

use super::{sh_runner, workspace_count};

#[tokio::test]
async fn workspace_is_removed_after_success() {
    let root = tempfile::tempdir().unwrap();
    let runner = sh_runner(root.path(), 5_000);

    let result = runner
        .execute(&ExecutionRequest::new("echo 'Hello, World!'", "python"))
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.stdout, "Hello, World!");
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn workspace_is_removed_after_runtime_error() {
    let root = tempfile::tempdir().unwrap();
    let runner = sh_runner(root.path(), 5_000);

    let result = runner
        .execute(&ExecutionRequest::new("echo boom >&2; exit 7", "python"))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::RuntimeError);
    assert_eq!(result.exit_code, Some(7));
    assert_eq!(result.stderr, "boom");
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn program_cannot_see_other_workspaces() {
    let root = tempfile::tempdir().unwrap();
    let runner = sh_runner(root.path(), 5_000);

    // A leftover from some other execution
    let other = WorkspaceManager::new(root.path()).acquire().await.unwrap();

    let result = runner
        .execute(&ExecutionRequest::new("ls", "python"))
        .await
        .unwrap();
    assert_eq!(result.stdout, "main.py");

    other.release().await;
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn concurrent_executions_use_distinct_workspaces() {
    let root = tempfile::tempdir().unwrap();
    let runner = sh_runner(root.path(), 10_000);

    let mut handles = Vec::new();
    for i in 0..8 {
        let runner = runner.clone();
        handles.push(tokio::spawn(async move {
            // Each program tags its own directory and reports it
            let source = format!("echo {i} > mark; sleep 0.2; cat mark; pwd");
            runner
                .execute(&ExecutionRequest::new(source, "python"))
                .await
                .unwrap()
        }));
    }

    let mut dirs = HashSet::new();
    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap();
        assert!(result.is_success(), "{result:?}");
        let mut lines = result.stdout.lines();
        assert_eq!(lines.next(), Some(i.to_string().as_str()));
        dirs.insert(lines.next().unwrap().to_string());
    }

    assert_eq!(dirs.len(), 8);
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn workspace_root_is_created_on_demand() {
    let root = tempfile::tempdir().unwrap();
    let nested = root.path().join("a/b/judgebox");
    let runner = sh_runner(&nested, 5_000);

    let result = runner
        .execute(&ExecutionRequest::new("echo ok", "python"))
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(nested.is_dir());
    assert_eq!(workspace_count(&nested), 0);
}
