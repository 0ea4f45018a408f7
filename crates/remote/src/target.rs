//! Device targets and remote path handling.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::RemoteError;

/// Transport used to reach a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// System `ssh`/`scp`.
    #[default]
    Ssh,
    /// This machine; host and principal are informational only.
    Local,
}

/// Resolved connection and provisioning parameters for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub id: String,
    pub host: String,
    /// Login name on the device.
    pub principal: String,
    pub port: Option<u16>,
    pub transport: Transport,
    /// Local identity file copied to the device on fresh installs.
    pub identity_artifact: Option<PathBuf>,
}

impl DeviceTarget {
    /// Creates an SSH target with no port override and no identity artifact.
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        principal: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            principal: principal.into(),
            port: None,
            transport: Transport::Ssh,
            identity_artifact: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_identity_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_artifact = Some(path.into());
        self
    }

    /// `principal@host`, as used by ssh and scp.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.principal, self.host)
    }

    /// Checks the target once, at resolution time.
    ///
    /// Host and principal end up as ssh/scp arguments, so values that could
    /// be parsed as options or that carry shell metacharacters are rejected.
    pub fn validate(&self) -> Result<(), RemoteError> {
        if self.id.trim().is_empty() {
            return Err(RemoteError::InvalidTarget("empty device id".into()));
        }
        if self.port == Some(0) {
            return Err(RemoteError::InvalidTarget(format!(
                "{}: port 0 is not a valid ssh port",
                self.id
            )));
        }
        if self.transport == Transport::Local {
            return Ok(());
        }

        check_token(&self.id, "host", &self.host, |c| {
            c.is_ascii_alphanumeric() || ".-_:[]%".contains(c)
        })?;
        check_token(&self.id, "principal", &self.principal, |c| {
            c.is_ascii_alphanumeric() || "._-".contains(c)
        })?;
        Ok(())
    }

    /// Identity artifact, when one is configured and present on disk.
    pub fn existing_identity_artifact(&self) -> Option<&Path> {
        self.identity_artifact
            .as_deref()
            .filter(|path| path.is_file())
    }
}

fn check_token(
    id: &str,
    field: &str,
    value: &str,
    allowed: impl Fn(char) -> bool,
) -> Result<(), RemoteError> {
    if value.is_empty() {
        return Err(RemoteError::InvalidTarget(format!("{id}: empty {field}")));
    }
    if value.starts_with('-') {
        return Err(RemoteError::InvalidTarget(format!(
            "{id}: {field} must not start with '-': {value}"
        )));
    }
    if let Some(bad) = value.chars().find(|&c| !allowed(c)) {
        return Err(RemoteError::InvalidTarget(format!(
            "{id}: {field} contains {bad:?}: {value}"
        )));
    }
    Ok(())
}

/// Validates an absolute POSIX path on the device.
///
/// Rejects empty and relative paths, `.` and `..` components, and control
/// characters (newlines would split a remote shell command).
pub fn validate_remote_path(path: &str) -> Result<(), RemoteError> {
    if path.is_empty() {
        return Err(RemoteError::InvalidPath("empty path".into()));
    }
    if !path.starts_with('/') {
        return Err(RemoteError::InvalidPath(format!(
            "remote path must be absolute: {path}"
        )));
    }
    if path.chars().any(char::is_control) {
        return Err(RemoteError::InvalidPath(format!(
            "control character in remote path: {path:?}"
        )));
    }
    if path.split('/').any(|part| part == "..") {
        return Err(RemoteError::InvalidPath(format!(
            "parent directory traversal not allowed: {path}"
        )));
    }
    if path.split('/').any(|part| part == ".") {
        return Err(RemoteError::InvalidPath(format!(
            "`.` component not allowed: {path}"
        )));
    }
    Ok(())
}

/// Joins `name` onto a remote directory path with exactly one `/`.
pub fn remote_join(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    format!("{base}/{name}")
}
