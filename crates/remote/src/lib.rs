//! Remote device access for rootfs deployment.
//!
//! Deploy logic talks to a device through the [`RemoteDevice`] trait: run
//! one command, copy one file. Two transports implement it: [`SshDevice`]
//! shells out to the system `ssh`/`scp`, and [`LocalDevice`] executes on
//! this machine (loopback deploys and tests). Commands are argv vectors
//! ([`RemoteCommand`]) and are only turned into a shell string, with each
//! argument quoted, at the SSH boundary.

mod command;
mod device;
mod local;
mod retry;
mod ssh;
mod target;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use command::{CommandOutput, RemoteCommand, quote_arg};
pub use device::{DeviceConnector, RemoteDevice, TransportConnector};
pub use local::LocalDevice;
pub use retry::{RetryPolicy, retry_transient};
pub use ssh::{SshDevice, SshOptions};
pub use target::{DeviceTarget, Transport, remote_join, validate_remote_path};

/// Boxed future returned by [`RemoteDevice`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced by remote transports.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("device unreachable ({destination}): {detail}")]
    Unreachable { destination: String, detail: String },

    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("invalid device target: {0}")]
    InvalidTarget(String),

    #[error("invalid remote path: {0}")]
    InvalidPath(String),
}

impl RemoteError {
    /// Transient failures are worth retrying: the device could not be
    /// reached or did not answer in time. Everything else is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Timeout { .. })
    }
}
