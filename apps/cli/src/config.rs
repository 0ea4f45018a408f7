//! Deployer configuration.
//!
//! Stored as TOML, looked up in this order:
//! - `--config PATH`
//! - `$ROOTDEPLOY_CONFIG`
//! - `~/.config/rootdeploy/config.toml`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use rootdeploy_install::{
    DEFAULT_IDENTITY_FILE_NAME, DEFAULT_INSTALL_ROOT, InstallLayout, SessionContext,
    StaticRegistry,
};
use rootdeploy_remote::{DeviceTarget, RetryPolicy, SshOptions, Transport};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Local rootfs tree to deploy.
    #[serde(default = "default_bundle_dir")]
    pub bundle_dir: PathBuf,

    /// Install root on devices.
    #[serde(default = "default_install_root")]
    pub install_root: String,

    /// Name of the identity file inside `etc`.
    #[serde(default = "default_identity_file_name")]
    pub identity_file_name: String,

    /// Where the local archive is staged (system temp dir if unset).
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Device registry, keyed by device id.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_ssh_program")]
    pub ssh_program: String,
    #[serde(default = "default_scp_program")]
    pub scp_program: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// One `[devices.<id>]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub transport: Transport,
    /// Relative paths are resolved against the config file's directory.
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

fn default_bundle_dir() -> PathBuf {
    PathBuf::from("rootfs")
}

fn default_install_root() -> String {
    DEFAULT_INSTALL_ROOT.into()
}

fn default_identity_file_name() -> String {
    DEFAULT_IDENTITY_FILE_NAME.into()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_command_timeout() -> u64 {
    300
}

fn default_ssh_program() -> String {
    "ssh".into()
}

fn default_scp_program() -> String {
    "scp".into()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_host() -> String {
    "localhost".into()
}

fn default_username() -> String {
    "root".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bundle_dir: default_bundle_dir(),
            install_root: default_install_root(),
            identity_file_name: default_identity_file_name(),
            scratch_dir: None,
            ssh: SshConfig::default(),
            retry: RetryConfig::default(),
            devices: BTreeMap::new(),
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            ssh_program: default_ssh_program(),
            scp_program: default_scp_program(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Config {
    /// Loads the configuration named by `explicit`, or the default file.
    ///
    /// An explicitly named file must exist. A missing default file yields
    /// the built-in defaults with an empty registry.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = config_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parses `path`. Relative paths in it become relative to its directory.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }

        tracing::debug!(
            path = %path.display(),
            devices = config.devices.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Anchors `bundle_dir`, `scratch_dir` and every `identity_file` at `base`.
    fn resolve_relative_to(&mut self, base: &Path) {
        anchor(&mut self.bundle_dir, base);
        if let Some(dir) = self.scratch_dir.as_mut() {
            anchor(dir, base);
        }
        for entry in self.devices.values_mut() {
            if let Some(identity) = entry.identity_file.as_mut() {
                anchor(identity, base);
            }
        }
    }

    pub fn registry(&self) -> StaticRegistry {
        self.devices
            .iter()
            .map(|(id, entry)| entry.to_target(id))
            .collect()
    }

    pub fn ssh_options(&self) -> SshOptions {
        SshOptions {
            ssh_program: self.ssh.ssh_program.clone(),
            scp_program: self.ssh.scp_program.clone(),
            connect_timeout: Duration::from_secs(self.ssh.connect_timeout_secs),
            command_timeout: Duration::from_secs(self.ssh.command_timeout_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn session_context(&self) -> SessionContext {
        let layout = InstallLayout {
            install_root: self.install_root.clone(),
            identity_file_name: self.identity_file_name.clone(),
        };
        let mut context = SessionContext::new(&self.bundle_dir)
            .with_layout(layout)
            .with_retry(self.retry_policy());
        if let Some(dir) = &self.scratch_dir {
            context = context.with_scratch_dir(dir);
        }
        context
    }
}

impl DeviceEntry {
    fn to_target(&self, id: &str) -> DeviceTarget {
        let mut target = DeviceTarget::new(id, &self.host, &self.username)
            .with_transport(self.transport);
        if let Some(port) = self.port {
            target = target.with_port(port);
        }
        if let Some(identity) = &self.identity_file {
            target = target.with_identity_artifact(identity);
        }
        target
    }
}

fn anchor(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

/// Returns the default configuration file path.
fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home)
        .join(".config")
        .join("rootdeploy")
        .join("config.toml")
}
