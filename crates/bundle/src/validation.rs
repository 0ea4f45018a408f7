use std::path::Path;

use crate::{BIN_DIR, BundleError};

/// Checks that `bundle_dir` is a directory holding a `bin` subtree.
///
/// Symlinks are followed, so a bundle root pointing at a staging
/// directory elsewhere is accepted.
pub fn validate_bundle_tree(bundle_dir: &Path) -> Result<(), BundleError> {
    if !bundle_dir.is_dir() {
        return Err(BundleError::Missing(bundle_dir.to_path_buf()));
    }

    let bin = bundle_dir.join(BIN_DIR);
    if !bin.is_dir() {
        return Err(BundleError::MissingBinaries(bin));
    }

    Ok(())
}
