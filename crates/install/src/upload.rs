//! Staging the archive on the device.

use rootdeploy_remote::{
    RemoteCommand, RemoteDevice, RetryPolicy, remote_join, retry_transient, validate_remote_path,
};
use tracing::info;

use crate::error::InstallError;
use crate::exec::check_output;
use crate::session::InstallSession;
use crate::types::REMOTE_ARCHIVE_NAME;

/// Creates a unique directory on the device and prints its path.
pub fn temp_dir_command() -> RemoteCommand {
    RemoteCommand::new("mktemp").arg("-d")
}

/// Creates the remote temp dir, registers it with the session and copies
/// the session's archive into it. Returns the remote archive path.
///
/// The temp dir is registered before the copy starts, so cleanup removes
/// it even when the copy fails.
pub(crate) async fn stage_archive(
    device: &dyn RemoteDevice,
    session: &mut InstallSession,
    retry: &RetryPolicy,
) -> Result<String, InstallError> {
    let mktemp = temp_dir_command();
    let mktemp_ref = &mktemp;
    let output = retry_transient(retry, "remote temp dir", move || {
        device.run_command(mktemp_ref)
    })
    .await?;
    let output = check_output(&mktemp, output)?;

    let temp_dir = output.stdout.trim().to_string();
    if temp_dir.is_empty() {
        return Err(InstallError::TransferFailed(
            "mktemp printed no directory".into(),
        ));
    }
    validate_remote_path(&temp_dir)
        .map_err(|e| InstallError::TransferFailed(format!("unusable remote temp dir: {e}")))?;
    session.set_remote_temp_dir(temp_dir.clone())?;

    let local = session
        .archive()
        .map(|archive| archive.path().to_path_buf())
        .ok_or_else(|| InstallError::TransferFailed("no archive to upload".into()))?;
    let remote = remote_join(&temp_dir, REMOTE_ARCHIVE_NAME);

    info!(
        destination = device.destination(),
        local = %local.display(),
        remote = %remote,
        "uploading archive"
    );
    let (local_ref, remote_ref) = (local.as_path(), remote.as_str());
    retry_transient(retry, "archive upload", move || {
        device.upload(local_ref, remote_ref)
    })
    .await?;

    Ok(remote)
}
