// Network Fail-Safe - Command Runner
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Bounded execution of external OS commands.
//!
//! Every network-control and reachability call goes through a
//! [`CommandRunner`]. Programs run directly with an argument vector,
//! never through a shell. A command that outlives its time limit is
//! killed and reaped before the call returns.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::models::CommandError;

/// Runs external commands and captures their stdout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, failing if it takes longer than `limit`.
    async fn run(&self, program: &str, args: &[&str], limit: Duration) -> Result<String, CommandError>;
}

/// Runner backed by real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

/// Render a command line for log and error messages.
pub fn display_command(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.contains(char::is_whitespace) {
            line.push('"');
            line.push_str(arg);
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}

async fn read_pipe<R>(pipe: Option<R>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str], limit: Duration) -> Result<String, CommandError> {
        let command = display_command(program, args);
        debug!("Running: {}", command);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::SpawnFailure {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        let stdout = read_pipe(child.stdout.take());
        let stderr = read_pipe(child.stderr.take());

        let outcome: Result<std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)>, _> = {
            let wait = child.wait();
            tokio::time::timeout(limit, async { tokio::try_join!(wait, stdout, stderr) }).await
        };

        match outcome {
            Ok(Ok((status, out, err))) => {
                let stdout = String::from_utf8_lossy(&out).into_owned();
                if status.success() {
                    Ok(stdout)
                } else {
                    Err(CommandError::NonZeroExit {
                        command,
                        code: status.code(),
                        stderr: String::from_utf8_lossy(&err).into_owned(),
                        stdout,
                    })
                }
            }
            Ok(Err(e)) => {
                // Lost the pipes or the wait; make sure nothing is left behind.
                let _ = child.kill().await;
                Err(CommandError::SpawnFailure {
                    command,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out command {}: {}", command, e);
                }
                Err(CommandError::Timeout { command, limit })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout() {
        let out = SystemCommandRunner
            .run("echo", &["hello", "world"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello world");
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr_and_code() {
        let err = SystemCommandRunner
            .run("sh", &["-c", "echo oops >&2; exit 3"], Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            CommandError::NonZeroExit { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let err = SystemCommandRunner
            .run("nonexistent_command_xyz", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::SpawnFailure { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_the_process() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > {}; exec sleep 30", pid_file.display());

        let started = std::time::Instant::now();
        let err = SystemCommandRunner
            .run("sh", &["-c", &script], Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let proc_dir = std::path::PathBuf::from(format!("/proc/{}", pid.trim()));
        assert!(!proc_dir.exists(), "process {} survived the timeout", pid.trim());
    }

    #[test]
    fn test_display_command_quotes_spaces() {
        assert_eq!(
            display_command("nmcli", &["device", "wifi", "connect", "My Net"]),
            "nmcli device wifi connect \"My Net\""
        );
    }
}
