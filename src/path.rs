// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where provisioning artifacts live on the file system: the
//! staging directory an archive gets extracted into, the clone directories
//! produced from it, and the files inside a clone that datasource injection
//! touches.
//!
//! # Layout
//!
//! Given an archive at `/dist/app.zip` and a working directory of `/work`:
//!
//! - Staging directory: `/work/app`.
//! - Clone directories: `/dist/app_clone_1`, `/dist/app_clone_2`, ...
//! - Driver library: `/dist/app_clone_1/lib/<driver>-jdbc-driver.jar`.
//! - Configuration file: `/dist/app_clone_1/conf/deployment.toml`.

use std::path::{Path, PathBuf};

/// Library directory of a clone, relative to the clone's top-level.
pub const LIB_DIR: &str = "lib";

/// Configuration directory of a clone, relative to the clone's top-level.
pub const CONF_DIR: &str = "conf";

/// Name of configuration file receiving datasource blocks.
pub const DEPLOYMENT_CONFIG: &str = "deployment.toml";

/// Determine staging directory name of an archive.
///
/// Strips leading directories and the final extension from the archive's file
/// name, e.g., `dist/wso2am-4.2.0.zip` becomes `wso2am-4.2.0`.
///
/// # Errors
///
/// - Return [`PathError::NoFileStem`] if archive path has no file name.
pub fn staging_dir_name(archive: impl AsRef<Path>) -> Result<String> {
    archive
        .as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| PathError::NoFileStem {
            path: archive.as_ref().to_path_buf(),
        })
}

/// Determine absolute path to directory containing an archive.
///
/// # Errors
///
/// - Return [`PathError::Canonicalize`] if archive path cannot be resolved.
pub fn archive_parent_dir(archive: impl AsRef<Path>) -> Result<PathBuf> {
    let archive = archive.as_ref();
    let absolute = archive
        .canonicalize()
        .map_err(|source| PathError::Canonicalize {
            source,
            path: archive.to_path_buf(),
        })?;

    Ok(absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(absolute))
}

/// Determine path of the clone with a given index.
///
/// Clone indices start at 1.
pub fn clone_dir(parent: impl AsRef<Path>, base: &str, index: usize) -> PathBuf {
    parent.as_ref().join(format!("{base}_clone_{index}"))
}

/// Determine library directory of a clone.
pub fn lib_dir(clone: impl AsRef<Path>) -> PathBuf {
    clone.as_ref().join(LIB_DIR)
}

/// Determine path of a clone's deployment configuration file.
pub fn deployment_config(clone: impl AsRef<Path>) -> PathBuf {
    clone.as_ref().join(CONF_DIR).join(DEPLOYMENT_CONFIG)
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Archive path has no file name to derive a staging directory from.
    #[error("cannot derive staging directory name from {:?}", path.display())]
    NoFileStem { path: PathBuf },

    /// Archive path cannot be made absolute.
    #[error("failed to resolve absolute path of {:?}", path.display())]
    Canonicalize {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
