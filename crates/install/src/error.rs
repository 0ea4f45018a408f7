//! Install error and warning types.

use std::path::PathBuf;

use rootdeploy_bundle::BundleError;
use rootdeploy_remote::RemoteError;

/// Fatal errors. Any of these ends the session (after cleanup).
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("unknown device: {0}")]
    DeviceNotFound(String),

    #[error("invalid device target: {0}")]
    InvalidDevice(String),

    #[error("invalid install layout: {0}")]
    InvalidLayout(String),

    #[error("bundle not found: {}", .0.display())]
    BundleMissing(PathBuf),

    #[error("packaging failed: {0}")]
    Bundle(#[source] BundleError),

    #[error("device unreachable: {0}")]
    DeviceUnreachable(String),

    #[error("remote command `{command}` failed: {stderr}")]
    RemoteCommandFailed { command: String, stderr: String },

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl From<BundleError> for InstallError {
    fn from(e: BundleError) -> Self {
        match e {
            BundleError::Missing(path) | BundleError::MissingBinaries(path) => {
                Self::BundleMissing(path)
            }
            other => Self::Bundle(other),
        }
    }
}

impl From<RemoteError> for InstallError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Transfer(msg) => Self::TransferFailed(msg),
            RemoteError::InvalidPath(msg) => {
                Self::TransferFailed(format!("invalid remote path: {msg}"))
            }
            RemoteError::InvalidTarget(msg) => Self::InvalidDevice(msg),
            e @ (RemoteError::Spawn { .. }
            | RemoteError::Unreachable { .. }
            | RemoteError::Timeout { .. }) => Self::DeviceUnreachable(e.to_string()),
        }
    }
}

/// Non-fatal conditions. Logged and reported, never change the outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstallWarning {
    #[error("identity artifact not found, skipping provisioning: {}", .0.display())]
    IdentityArtifactMissing(PathBuf),

    #[error("cleanup of {resource} failed: {reason}")]
    CleanupFailed { resource: String, reason: String },
}
