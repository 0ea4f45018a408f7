//! Transport that runs everything on this machine.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::trace;

use crate::command::{CommandOutput, RemoteCommand};
use crate::device::RemoteDevice;
use crate::target::validate_remote_path;
use crate::{BoxFuture, RemoteError};

/// Executes commands locally without a shell and copies files with the
/// filesystem. "Remote" paths are paths on this machine.
#[derive(Debug, Clone, Default)]
pub struct LocalDevice {
    timeout: Option<Duration>,
}

impl LocalDevice {
    /// Creates a local device; `timeout` bounds each command.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    async fn execute(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteError> {
        trace!(command = %command, "local exec");

        let mut cmd = Command::new(command.program());
        cmd.args(command.arguments());
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        let child = cmd.output();

        let output = match self.timeout {
            Some(after) => tokio::time::timeout(after, child).await.map_err(|_| {
                RemoteError::Timeout {
                    operation: command.program().to_string(),
                    after,
                }
            })?,
            None => child.await,
        }
        .map_err(|source| RemoteError::Spawn {
            program: command.program().to_string(),
            source,
        })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }

    async fn copy(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        validate_remote_path(remote)?;
        tokio::fs::copy(local, remote).await.map_err(|e| {
            RemoteError::Transfer(format!("{} -> {remote}: {e}", local.display()))
        })?;
        Ok(())
    }
}

impl RemoteDevice for LocalDevice {
    fn run_command<'a>(
        &'a self,
        command: &'a RemoteCommand,
    ) -> BoxFuture<'a, Result<CommandOutput, RemoteError>> {
        Box::pin(self.execute(command))
    }

    fn upload<'a>(
        &'a self,
        local: &'a Path,
        remote: &'a str,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(self.copy(local, remote))
    }

    fn destination(&self) -> &str {
        "localhost"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let device = LocalDevice::default();
        let out = device
            .run_command(&RemoteCommand::new("echo").arg("hello world"))
            .await
            .unwrap();
        assert_eq!(out.stdout, "hello world\n");
        assert!(!out.has_error_output());
        assert_eq!(out.exit_code, Some(0));
    }

    #[tokio::test]
    async fn captures_stderr() {
        let device = LocalDevice::default();
        let cmd = RemoteCommand::new("sh").args(["-c", "echo oops >&2"]);
        let out = device.run_command(&cmd).await.unwrap();
        assert_eq!(out.stderr.trim(), "oops");
        assert!(out.has_error_output());
    }

    #[tokio::test]
    async fn arguments_are_not_reinterpreted() {
        let device = LocalDevice::default();
        let out = device
            .run_command(&RemoteCommand::new("echo").arg("$(id); `id`"))
            .await
            .unwrap();
        assert_eq!(out.stdout, "$(id); `id`\n");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let device = LocalDevice::default();
        let err = device
            .run_command(&RemoteCommand::new("rootdeploy-no-such-program"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Spawn { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let device = LocalDevice::new(Some(Duration::from_millis(50)));
        let err = device
            .run_command(&RemoteCommand::new("sleep").arg("5"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Timeout { .. }));
    }

    #[tokio::test]
    async fn upload_copies_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        std::fs::write(&src, b"PAYLOAD").unwrap();
        let dst = dir.path().join("dst.bin");

        let device = LocalDevice::default();
        device.upload(&src, dst.to_str().unwrap()).await.unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"PAYLOAD");
    }

    #[tokio::test]
    async fn upload_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        std::fs::write(&src, b"PAYLOAD").unwrap();
        let dst = dir.path().join("missing").join("dst.bin");

        let device = LocalDevice::default();
        let err = device.upload(&src, dst.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Transfer(_)));
    }

    #[tokio::test]
    async fn upload_rejects_relative_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let device = LocalDevice::default();
        let err = device.upload(file.path(), "relative/x").await.unwrap_err();
        assert!(matches!(err, RemoteError::InvalidPath(_)));
    }
}
