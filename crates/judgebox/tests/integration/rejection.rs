use judgebox::{ExecutionRequest, InvalidSubmission, RunError};

use super::{sh_runner, workspace_count};

async fn rejected(source: &str, language: &str) -> (RunError, usize) {
    let root = tempfile::tempdir().unwrap();
    let runner = sh_runner(root.path(), 5_000);
    let err = runner
        .execute(&ExecutionRequest::new(source, language))
        .await
        .unwrap_err();
    (err, workspace_count(root.path()))
}

#[tokio::test]
async fn os_import_is_rejected_without_side_effects() {
    let (err, workspaces) = rejected("import os\nos.system('ls')", "python").await;
    assert!(matches!(
        err,
        RunError::InvalidSubmission(InvalidSubmission::DangerousOperation { .. })
    ));
    assert_eq!(workspaces, 0);
}

#[tokio::test]
async fn empty_source_is_rejected() {
    let (err, workspaces) = rejected("  \n\t", "python").await;
    assert!(matches!(
        err,
        RunError::InvalidSubmission(InvalidSubmission::Empty)
    ));
    assert_eq!(workspaces, 0);
}

#[tokio::test]
async fn oversized_source_is_rejected() {
    let source = "a".repeat(10_001);
    let (err, workspaces) = rejected(&source, "python").await;
    match err {
        RunError::InvalidSubmission(InvalidSubmission::TooLong { length, max }) => {
            assert_eq!(length, 10_001);
            assert_eq!(max, 10_000);
        }
        other => panic!("expected TooLong, got {other:?}"),
    }
    assert_eq!(workspaces, 0);
}

#[tokio::test]
async fn unknown_language_is_rejected() {
    let (err, workspaces) = rejected("print(1)", "ruby").await;
    assert!(matches!(err, RunError::UnsupportedLanguage(_)));
    assert_eq!(workspaces, 0);
}

#[tokio::test]
async fn language_ids_are_case_sensitive() {
    let (err, _) = rejected("print(1)", "Python").await;
    assert!(matches!(err, RunError::UnsupportedLanguage(_)));
}

#[tokio::test]
async fn process_spawning_is_rejected_for_every_language() {
    let cases = [
        ("const cp = require('child_process');", "javascript"),
        ("Runtime.getRuntime().exec(\"ls\");", "java"),
        ("#include <unistd.h>\nint main() { fork(); }", "cpp"),
        ("int main() { system(\"ls\"); }", "c"),
    ];
    for (source, language) in cases {
        let (err, workspaces) = rejected(source, language).await;
        assert!(
            matches!(err, RunError::InvalidSubmission(_)),
            "{language}: {err:?}"
        );
        assert_eq!(workspaces, 0);
    }
}
