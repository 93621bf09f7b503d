//! Subprocess execution with an optional deadline.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::LocalError;
use crate::invocation::Invocation;

/// Captured output of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `invocation` to completion and capture its output.
///
/// The process owns no terminal: stdin is closed and both output streams are
/// piped to this call. If `deadline` elapses first the child is killed and
/// [`LocalError::Timeout`] is returned. A non-zero exit is an error carrying
/// the tail of stderr.
pub async fn run(
    invocation: &Invocation,
    deadline: Option<Duration>,
) -> Result<ProcessOutput, LocalError> {
    debug!(
        program = %invocation.program,
        args = invocation.args.len(),
        "spawning inference process"
    );

    let child = Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LocalError::BinaryNotFound(invocation.program.clone())
            } else {
                LocalError::Spawn(e)
            }
        })?;

    let pid = child.id();
    let wait = child.wait_with_output();

    // Dropping the wait future drops the child, and kill_on_drop reaps it.
    let output = match deadline {
        Some(limit) => match tokio::time::timeout(limit, wait).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(?pid, "inference process exceeded deadline of {:?}, killing", limit);
                return Err(LocalError::Timeout(limit));
            }
        },
        None => wait.await?,
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let code = output
            .status
            .code()
            .map(|c| format!("exit code {c}"))
            .unwrap_or_else(|| "a signal".to_string());
        return Err(LocalError::Exit {
            code,
            stderr: tail(&stderr, 400),
        });
    }

    debug!(?pid, bytes = stdout.len(), "inference process finished");
    Ok(ProcessOutput { stdout, stderr })
}

/// Last `max` characters of `s`, trimmed.
fn tail(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    let count = trimmed.chars().count();
    if count <= max {
        trimmed.to_string()
    } else {
        trimmed.chars().skip(count - max).collect()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Instant;

    fn script(dir: &std::path::Path, body: &str) -> String {
        let path = dir.join("fake-llama");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[tokio::test]
    async fn test_captures_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(
            dir.path(),
            r#"for a in "$@"; do printf '%s\n' "$a"; done; echo banner >&2"#,
        );
        let inv = Invocation::new(program).arg("-p").arg("a'b; $c");

        let output = run(&inv, None).await.unwrap();
        assert_eq!(output.stdout, "-p\na'b; $c\n");
        assert_eq!(output.stderr.trim(), "banner");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let inv = Invocation::new("sh").arg("-c").arg("echo boom >&2; exit 3");
        let err = run(&inv, None).await.unwrap_err();
        match err {
            LocalError::Exit { code, stderr } => {
                assert_eq!(code, "exit code 3");
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_deadline_kills_process() {
        let inv = Invocation::new("sleep").arg("5");
        let started = Instant::now();
        let err = run(&inv, Some(Duration::from_millis(100))).await.unwrap_err();
        assert!(matches!(err, LocalError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let inv = Invocation::new("/definitely/not/here/llama-cli");
        let err = run(&inv, None).await.unwrap_err();
        assert!(matches!(err, LocalError::BinaryNotFound(_)));
    }
}
