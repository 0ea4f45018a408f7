//! Rootfs install orchestration.
//!
//! This crate holds the decision logic for applying a packaged rootfs to a
//! device. It has no transport of its own: devices are reached through
//! [`rootdeploy_remote::RemoteDevice`] and resolved through a
//! [`DeviceRegistry`].
//!
//! # Pipeline
//!
//! 1. **Package**: archive the local bundle (no remote access yet)
//! 2. **Detect**: check the install root, `Fresh` if absent, `Update` if present
//! 3. **Upload**: create a remote temp dir and copy the archive into it
//! 4. **Apply**: extract everything (`Fresh`) or only `bin` (`Update`)
//! 5. **Identity**: on `Fresh`, copy the device identity file into `etc`
//! 6. **Cleanup**: remove the remote temp dir and the local archive, always

mod apply;
mod cleanup;
mod error;
mod exec;
mod mode;
mod orchestrator;
mod phase;
mod registry;
mod session;
mod types;
mod upload;

#[cfg(test)]
mod mock;

pub use apply::apply_plan;
pub use cleanup::remove_temp_dir_command;
pub use error::{InstallError, InstallWarning};
pub use mode::mode_check;
pub use orchestrator::InstallOrchestrator;
pub use phase::Phase;
pub use registry::{DeviceRegistry, StaticRegistry};
pub use session::InstallSession;
pub use types::{
    DEFAULT_IDENTITY_FILE_NAME, DEFAULT_INSTALL_ROOT, InstallEvent, InstallLayout, InstallMode,
    InstallOutcome, REMOTE_ARCHIVE_NAME, SessionContext,
};
pub use upload::temp_dir_command;
