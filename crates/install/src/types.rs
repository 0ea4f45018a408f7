//! Data types for the install flow.

use std::fmt;
use std::path::PathBuf;

use rootdeploy_bundle::{BIN_DIR, ETC_DIR};
use rootdeploy_remote::{RetryPolicy, remote_join, validate_remote_path};

use crate::error::{InstallError, InstallWarning};
use crate::phase::Phase;

/// Default install root on devices.
pub const DEFAULT_INSTALL_ROOT: &str = "/opt/buckyos";

/// Default file name of the provisioned device identity, inside `etc`.
pub const DEFAULT_IDENTITY_FILE_NAME: &str = "device.conf";

/// File name of the archive inside the remote temp dir.
pub const REMOTE_ARCHIVE_NAME: &str = "rootfs.tar.gz";

/// How a bundle is applied to a device. Decided once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// No install root yet: the whole bundle is extracted.
    Fresh,
    /// Install root exists: only `bin` is replaced.
    Update,
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fresh => "fresh",
            Self::Update => "update",
        })
    }
}

/// Paths on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub install_root: String,
    pub identity_file_name: String,
}

impl Default for InstallLayout {
    fn default() -> Self {
        Self {
            install_root: DEFAULT_INSTALL_ROOT.into(),
            identity_file_name: DEFAULT_IDENTITY_FILE_NAME.into(),
        }
    }
}

impl InstallLayout {
    pub fn new(install_root: impl Into<String>) -> Self {
        Self {
            install_root: install_root.into(),
            ..Self::default()
        }
    }

    pub fn bin_dir(&self) -> String {
        remote_join(&self.install_root, BIN_DIR)
    }

    pub fn etc_dir(&self) -> String {
        remote_join(&self.install_root, ETC_DIR)
    }

    pub fn identity_path(&self) -> String {
        remote_join(&self.etc_dir(), &self.identity_file_name)
    }

    /// Rejects install roots that are relative, contain `.` or `..`
    /// components, or name `/` itself, and identity names that are not a
    /// single file name.
    pub fn validate(&self) -> Result<(), InstallError> {
        validate_remote_path(&self.install_root)
            .map_err(|e| InstallError::InvalidLayout(e.to_string()))?;
        let has_component = self
            .install_root
            .split('/')
            .any(|part| !part.is_empty() && part != ".");
        if !has_component {
            return Err(InstallError::InvalidLayout(
                "install root must not be /".into(),
            ));
        }

        let name = self.identity_file_name.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(InstallError::InvalidLayout(format!(
                "identity file name must be a plain file name: {name:?}"
            )));
        }
        Ok(())
    }
}

/// Everything a session needs, passed explicitly.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Local rootfs tree to package.
    pub bundle_dir: PathBuf,
    pub layout: InstallLayout,
    /// Where the local archive is created; system temp dir when `None`.
    pub scratch_dir: Option<PathBuf>,
    /// Applied to mode detection and archive transfer only.
    pub retry: RetryPolicy,
}

impl SessionContext {
    pub fn new(bundle_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundle_dir: bundle_dir.into(),
            layout: InstallLayout::default(),
            scratch_dir: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_layout(mut self, layout: InstallLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Progress event emitted during an install session.
#[derive(Debug, Clone)]
pub enum InstallEvent {
    /// The session entered a new phase.
    PhaseChanged { device_id: String, phase: Phase },
    /// The install mode has been decided.
    ModeDetected {
        device_id: String,
        mode: InstallMode,
    },
    /// A non-fatal problem was recorded.
    Warning {
        device_id: String,
        warning: InstallWarning,
    },
    /// The session finished successfully.
    Completed {
        device_id: String,
        mode: InstallMode,
        install_root: String,
    },
    /// The session failed.
    Failed { device_id: String, error: String },
}

/// Result of one install session.
#[derive(Debug)]
pub struct InstallOutcome {
    pub device_id: String,
    pub success: bool,
    pub mode: Option<InstallMode>,
    pub error: Option<InstallError>,
    pub warnings: Vec<InstallWarning>,
    /// Every phase the session went through, in order.
    pub phases: Vec<Phase>,
}

impl InstallOutcome {
    /// Human-readable failure cause.
    pub fn cause(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn final_phase(&self) -> Option<&Phase> {
        self.phases.last()
    }
}
