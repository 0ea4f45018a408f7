//! Transport over the system OpenSSH client.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, trace};

use crate::command::{CommandOutput, RemoteCommand};
use crate::device::RemoteDevice;
use crate::target::{DeviceTarget, validate_remote_path};
use crate::{BoxFuture, RemoteError};

/// Exit status ssh uses for its own (connection level) failures.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Options for the ssh/scp invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshOptions {
    pub ssh_program: String,
    pub scp_program: String,
    /// Passed to ssh as `ConnectTimeout`.
    pub connect_timeout: Duration,
    /// Upper bound for one command or one file copy.
    pub command_timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".into(),
            scp_program: "scp".into(),
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(300),
        }
    }
}

/// A device reached over `ssh` and `scp`.
///
/// ssh runs in batch mode so a missing key fails immediately instead of
/// prompting, and with `LogLevel=ERROR` so host-key notices do not show up
/// on stderr and get mistaken for command failures.
#[derive(Debug, Clone)]
pub struct SshDevice {
    host: String,
    port: Option<u16>,
    destination: String,
    options: SshOptions,
}

impl SshDevice {
    pub fn new(target: &DeviceTarget, options: SshOptions) -> Self {
        Self {
            host: target.host.clone(),
            port: target.port,
            destination: target.destination(),
            options,
        }
    }

    fn common_options(&self) -> Vec<String> {
        vec![
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.options.connect_timeout.as_secs().max(1)),
            "-o".into(),
            "LogLevel=ERROR".into(),
        ]
    }

    /// Arguments for `ssh` running `command` on the device.
    pub(crate) fn ssh_args(&self, command: &RemoteCommand) -> Vec<String> {
        let mut args = self.common_options();
        if let Some(port) = self.port {
            args.push("-p".into());
            args.push(port.to_string());
        }
        args.push(self.destination.clone());
        args.push("--".into());
        args.push(command.to_shell());
        args
    }

    /// Arguments for `scp` copying `local` to `remote` on the device.
    pub(crate) fn scp_args(&self, local: &Path, remote: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-q".into()];
        args.extend(self.common_options().into_iter().map(OsString::from));
        if let Some(port) = self.port {
            args.push("-P".into());
            args.push(port.to_string().into());
        }
        args.push("--".into());
        args.push(local.as_os_str().to_owned());

        // scp splits `host:path` on the first colon outside brackets.
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let user = self
            .destination
            .rsplit_once('@')
            .map_or("", |(user, _)| user);
        args.push(format!("{user}@{host}:{remote}").into());
        args
    }

    async fn exec<I, S>(&self, program: &str, args: I) -> Result<Output, RemoteError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);

        let after = self.options.command_timeout;
        tokio::time::timeout(after, cmd.output())
            .await
            .map_err(|_| RemoteError::Timeout {
                operation: format!("{program} to {}", self.destination),
                after,
            })?
            .map_err(|source| RemoteError::Spawn {
                program: program.to_string(),
                source,
            })
    }

    fn unreachable(&self, stderr: &str) -> RemoteError {
        RemoteError::Unreachable {
            destination: self.destination.clone(),
            detail: stderr.trim().to_string(),
        }
    }

    async fn execute(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteError> {
        trace!(destination = %self.destination, command = %command, "ssh exec");
        let output = self
            .exec(&self.options.ssh_program, self.ssh_args(command))
            .await?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.code() == Some(SSH_CONNECTION_FAILURE) {
            return Err(self.unreachable(&stderr));
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
            exit_code: output.status.code(),
        })
    }

    async fn copy(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        validate_remote_path(remote)?;
        debug!(destination = %self.destination, local = %local.display(), remote, "scp upload");

        let output = self
            .exec(&self.options.scp_program, self.scp_args(local, remote))
            .await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.code() == Some(SSH_CONNECTION_FAILURE) || is_connection_failure(&stderr) {
            return Err(self.unreachable(&stderr));
        }
        Err(RemoteError::Transfer(if stderr.trim().is_empty() {
            format!("{} exited with {}", self.options.scp_program, output.status)
        } else {
            stderr.trim().to_string()
        }))
    }
}

/// scp reports ssh connection errors with its own exit status, so they are
/// recognised by message.
fn is_connection_failure(stderr: &str) -> bool {
    const MARKERS: [&str; 4] = [
        "ssh: connect to host",
        "Could not resolve hostname",
        "Connection closed by",
        "Connection timed out",
    ];
    MARKERS.iter().any(|m| stderr.contains(m))
}

impl RemoteDevice for SshDevice {
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
        &self.destination
    }
}
