//! Subprocess execution
//!
//! Runs Go toolchain commands with an explicit environment and working
//! directory, logging their output line by line.

use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use rclone_ndk_android_toolchain::BuildEnv;

/// Result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Last few lines of stderr, or stdout when stderr is empty
    pub fn diagnostic(&self) -> String {
        let source = if self.stderr.trim().is_empty() { &self.stdout } else { &self.stderr };
        let lines: Vec<&str> = source.lines().collect();
        let start = lines.len().saturating_sub(20);
        let tail = lines[start..].join("\n");
        match self.exit_code {
            Some(code) => format!("exit code {}: {}", code, tail),
            None => format!("terminated by signal: {}", tail),
        }
    }
}

/// Build a command for `program` with the given environment layered over
/// the inherited one
pub fn command(program: &Path, args: &[String], env: &BuildEnv, dir: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(dir)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Run a command to completion, streaming its output to the debug log
pub async fn run(mut cmd: Command, label: &str) -> std::io::Result<CommandOutput> {
    debug!("[{}] spawning {:?}", label, cmd.as_std());
    let mut child = cmd.spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr, status) = tokio::join!(
        collect(stdout, label),
        collect(stderr, label),
        child.wait(),
    );
    let status = status?;

    Ok(CommandOutput {
        success: status.success(),
        exit_code: status.code(),
        stdout,
        stderr,
    })
}

async fn collect<R: AsyncRead + Unpin>(reader: Option<R>, label: &str) -> String {
    let mut collected = String::new();
    let Some(reader) = reader else {
        return collected;
    };

    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("[{}] {}", label, line);
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_env_reaches_child_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = BuildEnv::new();
        env.set("RCLONE_NDK_MARKER_VAR", "from-build-env");

        let cmd = command(
            &PathBuf::from("/bin/sh"),
            &["-c".to_string(), "echo $RCLONE_NDK_MARKER_VAR; pwd".to_string()],
            &env,
            dir.path(),
        );
        let output = run(cmd, "env-check").await.unwrap();

        assert!(output.success);
        assert!(output.stdout.starts_with("from-build-env\n"));
        assert!(std::env::var("RCLONE_NDK_MARKER_VAR").is_err());
    }

    #[tokio::test]
    async fn test_failure_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = command(
            &PathBuf::from("/bin/sh"),
            &["-c".to_string(), "echo boom >&2; exit 3".to_string()],
            &BuildEnv::new(),
            dir.path(),
        );
        let output = run(cmd, "fail").await.unwrap();

        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.diagnostic(), "exit code 3: boom");
    }
}
