//! Running remote commands with the stderr failure rule.

use rootdeploy_remote::{CommandOutput, RemoteCommand, RemoteDevice};
use tracing::debug;

use crate::error::InstallError;

/// Fails with `RemoteCommandFailed` when the command wrote to stderr.
pub(crate) fn check_output(
    command: &RemoteCommand,
    output: CommandOutput,
) -> Result<CommandOutput, InstallError> {
    if output.has_error_output() {
        return Err(InstallError::RemoteCommandFailed {
            command: command.to_string(),
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}

/// Runs `command` once and applies [`check_output`].
pub(crate) async fn run_checked(
    device: &dyn RemoteDevice,
    command: &RemoteCommand,
) -> Result<CommandOutput, InstallError> {
    debug!(destination = device.destination(), command = %command, "remote command");
    let output = device.run_command(command).await?;
    check_output(command, output)
}
