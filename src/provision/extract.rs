// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Archive extraction.
//!
//! Unpacks a server archive into the staging directory that clones are
//! produced from. Server distributions are usually packed with their own
//! top-level directory, e.g., `wso2am-4.2.0.zip` holds `wso2am-4.2.0/...`. In
//! that case only the contents of that directory are unpacked, straight into
//! the staging directory, and any entry outside of it (`__MACOSX/` resource
//! forks, stray top-level files) is discarded. Any other archive is unpacked
//! directly into the staging directory as is.

use std::{
    fs::{self, File},
    io::{self, Read, Seek},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};
use zip::{result::ZipError, ZipArchive};

/// Extract archive contents into staging directory.
///
/// # Errors
///
/// - Return [`ExtractError::OpenArchive`] if archive cannot be opened.
/// - Return [`ExtractError::Zip`] if archive is corrupt or uses an
///   unsupported format.
/// - Return [`ExtractError::CreateDir`] if staging directory, or a directory
///   inside of it, cannot be created.
/// - Return [`ExtractError::WriteEntry`] if an archive entry cannot be
///   written.
#[instrument(skip(archive, staging), level = "debug")]
pub fn extract_archive(archive: impl AsRef<Path>, staging: impl AsRef<Path>) -> Result<()> {
    let (archive, staging) = (archive.as_ref(), staging.as_ref());
    info!(
        "extract {:?} into {:?}",
        archive.display(),
        staging.display()
    );

    let file = File::open(archive).map_err(|source| ExtractError::OpenArchive {
        source,
        path: archive.to_path_buf(),
    })?;
    let mut zip = ZipArchive::new(file)?;
    debug!("archive holds {} entries", zip.len());

    let root = staging
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    ensure_dir(staging)?;
    if has_own_root(&zip, &root) {
        debug!("archive wraps its contents in {root:?}");
        extract_subtree(&mut zip, &root, staging)?;
    } else {
        zip.extract(staging)?;
    }

    Ok(())
}

/// Check if any archive entry lives under a top-level directory named `root`.
fn has_own_root<R>(zip: &ZipArchive<R>, root: &str) -> bool
where
    R: Read + Seek,
{
    !root.is_empty()
        && zip.file_names().any(|name| {
            name.strip_prefix(root)
                .is_some_and(|rest| rest.starts_with('/'))
        })
}

/// Unpack entries under `root` into `staging`, skipping everything else.
fn extract_subtree<R>(zip: &mut ZipArchive<R>, root: &str, staging: &Path) -> Result<()>
where
    R: Read + Seek,
{
    let mut skipped = 0usize;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let relative = entry
            .enclosed_name()
            .and_then(|name| name.strip_prefix(root).ok().map(Path::to_path_buf));
        let Some(relative) = relative else {
            debug!("skip {:?}", entry.name());
            skipped += 1;
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let target = staging.join(relative);
        if entry.is_dir() {
            ensure_dir(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        let mut file = File::create(&target).map_err(|source| ExtractError::WriteEntry {
            source,
            path: target.clone(),
        })?;
        io::copy(&mut entry, &mut file).map_err(|source| ExtractError::WriteEntry {
            source,
            path: target.clone(),
        })?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;

            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777)).map_err(
                |source| ExtractError::WriteEntry {
                    source,
                    path: target.clone(),
                },
            )?;
        }
    }

    if skipped > 0 {
        warn!("discarded {skipped} archive entries outside of {root:?}");
    }

    Ok(())
}

fn ensure_dir(path: &Path) -> Result<()> {
    mkdirp::mkdirp(path).map_err(|source| ExtractError::CreateDir {
        source,
        path: path.to_path_buf(),
    })?;

    Ok(())
}

/// Archive extraction error types.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Archive file cannot be opened.
    #[error("failed to open archive {:?}", path.display())]
    OpenArchive {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Staging directory, or a directory inside of it, cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Archive entry cannot be written into staging directory.
    #[error("failed to write archive entry to {:?}", path.display())]
    WriteEntry {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Archive cannot be read or unpacked.
    #[error(transparent)]
    Zip(#[from] ZipError),
}

/// Friendly result alias :3
pub type Result<T, E = ExtractError> = std::result::Result<T, E>;
