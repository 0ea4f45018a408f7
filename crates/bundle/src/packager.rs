use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::BundleError;
use crate::validation::validate_bundle_tree;

/// File name suffix of packaged bundles.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// A packaged bundle on local disk.
///
/// The archive lives in a temporary file owned by this value. It is deleted
/// when the value is dropped; [`close`](Self::close) deletes it explicitly
/// and reports removal errors.
#[derive(Debug)]
pub struct BundleArchive {
    file: NamedTempFile,
    size: u64,
    sha256: String,
}

impl BundleArchive {
    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Archive size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hex SHA-256 of the archive file.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Deletes the archive file.
    pub fn close(self) -> Result<(), BundleError> {
        self.file.close()?;
        Ok(())
    }
}

/// Packs `bundle_dir` into a gzip-compressed tar archive.
///
/// Entry names are relative to the bundle root (`bin/...`, `etc/...`) with
/// no leading `./`, so a device can extract the `bin` member by name.
/// Symlinks are stored as links. The archive is created in `scratch_dir`
/// when given, otherwise in the system temp directory.
pub fn pack_bundle(
    bundle_dir: &Path,
    scratch_dir: Option<&Path>,
) -> Result<BundleArchive, BundleError> {
    validate_bundle_tree(bundle_dir)?;

    let mut builder = tempfile::Builder::new();
    builder.prefix("rootfs-").suffix(ARCHIVE_SUFFIX);
    let file = match scratch_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };

    let members = write_archive(bundle_dir, file.as_file())?;
    let (size, sha256) = digest_file(file.path())?;

    debug!(
        bundle = %bundle_dir.display(),
        archive = %file.path().display(),
        members,
        size,
        sha256 = %sha256,
        "bundle packed"
    );

    Ok(BundleArchive { file, size, sha256 })
}

/// Writes every top-level entry of `bundle_dir` into `out`. Returns the
/// number of top-level members written.
fn write_archive(bundle_dir: &Path, out: &File) -> Result<usize, BundleError> {
    let encoder = GzEncoder::new(BufWriter::new(out), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut children = std::fs::read_dir(bundle_dir)?.collect::<Result<Vec<_>, _>>()?;
    children.sort_by_key(|entry| entry.file_name());

    for child in &children {
        let name = child.file_name();
        let path = child.path();
        if child.file_type()?.is_dir() {
            builder.append_dir_all(&name, &path)?;
        } else {
            builder.append_path_with_name(&path, &name)?;
        }
    }

    let encoder = builder.into_inner()?;
    let mut writer = encoder.finish()?;
    writer.flush()?;

    Ok(children.len())
}

fn digest_file(path: &Path) -> Result<(u64, String), BundleError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    let mut size = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((size, hex::encode(hasher.finalize())))
}
