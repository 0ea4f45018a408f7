//! The device access trait and the default connector.

use std::path::Path;
use std::sync::Arc;

use crate::command::{CommandOutput, RemoteCommand};
use crate::local::LocalDevice;
use crate::ssh::{SshDevice, SshOptions};
use crate::target::{DeviceTarget, Transport};
use crate::{BoxFuture, RemoteError};

/// Abstract connection to a device.
///
/// Each call is one blocking round trip from the caller's point of view.
/// Using a trait keeps deploy logic decoupled from ssh and testable with
/// mocks.
pub trait RemoteDevice: Send + Sync {
    /// Runs a command and captures its stdout and stderr.
    ///
    /// `Err` means the command could not be run at all (spawn failure,
    /// unreachable device, timeout). A command that ran and complained
    /// returns `Ok` with non-empty stderr.
    fn run_command<'a>(
        &'a self,
        command: &'a RemoteCommand,
    ) -> BoxFuture<'a, Result<CommandOutput, RemoteError>>;

    /// Copies a local file to an absolute path on the device.
    fn upload<'a>(&'a self, local: &'a Path, remote: &'a str)
    -> BoxFuture<'a, Result<(), RemoteError>>;

    /// Human-readable destination for logs (`root@10.0.0.2`, `localhost`).
    fn destination(&self) -> &str;
}

/// Opens a [`RemoteDevice`] for a resolved target.
pub trait DeviceConnector: Send + Sync {
    fn connect(&self, target: &DeviceTarget) -> Result<Arc<dyn RemoteDevice>, RemoteError>;
}

/// Connector choosing the transport named by the target.
#[derive(Debug, Clone, Default)]
pub struct TransportConnector {
    ssh: SshOptions,
}

impl TransportConnector {
    pub fn new(ssh: SshOptions) -> Self {
        Self { ssh }
    }
}

impl DeviceConnector for TransportConnector {
    fn connect(&self, target: &DeviceTarget) -> Result<Arc<dyn RemoteDevice>, RemoteError> {
        target.validate()?;
        let device: Arc<dyn RemoteDevice> = match target.transport {
            Transport::Ssh => Arc::new(SshDevice::new(target, self.ssh.clone())),
            Transport::Local => Arc::new(LocalDevice::new(Some(self.ssh.command_timeout))),
        };
        Ok(device)
    }
}
