//! Releasing session resources.

use rootdeploy_remote::{RemoteCommand, RemoteDevice};
use tracing::{debug, warn};

use crate::error::InstallWarning;
use crate::session::InstallSession;

/// Removes a remote temp dir.
pub fn remove_temp_dir_command(dir: &str) -> RemoteCommand {
    RemoteCommand::new("rm").args(["-rf", dir])
}

/// Removes the remote temp dir and deletes the local archive, whichever
/// the session holds. Best effort: failures come back as warnings and
/// never affect the session outcome.
pub(crate) async fn release(
    device: &dyn RemoteDevice,
    session: &mut InstallSession,
) -> Vec<InstallWarning> {
    let mut warnings = Vec::new();

    if let Some(dir) = session.take_remote_temp_dir() {
        let command = remove_temp_dir_command(&dir);
        let failure = match device.run_command(&command).await {
            Ok(output) if output.has_error_output() => Some(output.stderr.trim().to_string()),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
        match failure {
            Some(reason) => {
                warn!(
                    device = %session.device_id(),
                    dir = %dir,
                    reason = %reason,
                    "failed to remove remote temp dir"
                );
                warnings.push(InstallWarning::CleanupFailed {
                    resource: format!("remote temp dir {dir}"),
                    reason,
                });
            }
            None => debug!(device = %session.device_id(), dir = %dir, "removed remote temp dir"),
        }
    }

    if let Some(archive) = session.take_archive() {
        let path = archive.path().display().to_string();
        match archive.close() {
            Ok(()) => debug!(archive = %path, "removed local archive"),
            Err(e) => {
                warn!(archive = %path, error = %e, "failed to remove local archive");
                warnings.push(InstallWarning::CleanupFailed {
                    resource: format!("local archive {path}"),
                    reason: e.to_string(),
                });
            }
        }
    }

    warnings
}
