//! Rootfs bundle packaging.
//!
//! A bundle is a directory tree laid out exactly as it should appear under
//! the install root on a device. It must contain a `bin` subtree; anything
//! else (`etc`, data files) is carried along on fresh installs.

mod packager;
mod validation;

use std::path::PathBuf;

pub use packager::{ARCHIVE_SUFFIX, BundleArchive, pack_bundle};
pub use validation::validate_bundle_tree;

/// Binary subtree inside a bundle and under the install root.
pub const BIN_DIR: &str = "bin";

/// Configuration and identity subtree inside a bundle and under the install root.
pub const ETC_DIR: &str = "etc";

/// Errors produced by the bundle crate.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("bundle directory not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("bundle has no binary subtree: {}", .0.display())]
    MissingBinaries(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
