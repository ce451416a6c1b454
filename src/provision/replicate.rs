// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Directory tree replication.
//!
//! Produces independent deep copies of the staging directory. Every clone is
//! a plain copy of file contents, so mutating one clone never affects the
//! staging directory or any other clone.

use ignore::WalkBuilder;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Recursively copy directory tree at `src` into new directory `dest`.
///
/// Hidden files and ignore files are copied like everything else. Symbolic
/// links are followed, so the copy holds the contents of link targets rather
/// than the links themselves. The destination must not exist beforehand. No
/// rollback occurs if copying fails partway through.
///
/// # Errors
///
/// - Return [`CopyError::DestinationExists`] if `dest` already exists.
/// - Return [`CopyError::CreateDir`] if a directory cannot be created.
/// - Return [`CopyError::CopyFile`] if a file cannot be copied.
/// - Return [`CopyError::Walk`] if source tree cannot be traversed.
#[instrument(skip(src, dest), level = "debug")]
pub fn copy_tree(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let (src, dest) = (src.as_ref(), dest.as_ref());

    // INVARIANT: Never merge into or overwrite an existing directory.
    fs::create_dir(dest).map_err(|source| match source.kind() {
        ErrorKind::AlreadyExists => CopyError::DestinationExists {
            path: dest.to_path_buf(),
        },
        _ => CopyError::CreateDir {
            source,
            path: dest.to_path_buf(),
        },
    })?;

    let walker = WalkBuilder::new(src)
        .standard_filters(false)
        .follow_links(true)
        .build();

    for entry in walker {
        let entry = entry?;
        if entry.depth() == 0 {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(relative);

        // INVARIANT: Walker yields parents before children.
        if entry.file_type().is_some_and(|kind| kind.is_dir()) {
            debug!("create directory {:?}", target.display());
            fs::create_dir(&target).map_err(|source| CopyError::CreateDir {
                source,
                path: target.clone(),
            })?;
        } else {
            debug!("copy {:?} to {:?}", entry.path().display(), target.display());
            fs::copy(entry.path(), &target).map_err(|source| CopyError::CopyFile {
                source,
                from: entry.path().to_path_buf(),
                to: target.clone(),
            })?;
        }
    }

    Ok(())
}

/// Directory replication error types.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    /// Clone destination is already present.
    #[error("cannot clone into {:?}, destination already exists", path.display())]
    DestinationExists { path: PathBuf },

    /// Directory of copy cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be copied.
    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    CopyFile {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Source tree cannot be traversed.
    #[error(transparent)]
    Walk(#[from] ignore::Error),
}

/// Friendly result alias :3
pub type Result<T, E = CopyError> = std::result::Result<T, E>;
