//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Deploy a packaged rootfs bundle to a registered device.
///
/// Installs fresh when the device has no install root yet, otherwise
/// replaces only its `bin` directory.
#[derive(Parser, Debug)]
#[command(name = "rootdeploy", version, about)]
pub struct Cli {
    /// Device id from the registry.
    pub device_id: String,

    /// Configuration file.
    #[arg(long, short = 'c', env = "ROOTDEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Local rootfs directory (overrides `bundle_dir`).
    #[arg(long, short = 'b')]
    pub bundle: Option<PathBuf>,

    /// Install root on the device (overrides `install_root`).
    #[arg(long)]
    pub install_root: Option<String>,

    /// Enable debug logging.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
