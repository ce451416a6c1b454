// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Datasource injection.
//!
//! Wires a clone to a datastore in two steps. First, the driver library is
//! written into the clone's library directory. Second, a datasource block
//! describing the connection is appended to the clone's deployment
//! configuration file. Existing configuration content is never rewritten,
//! only appended to. Injecting the same record twice yields two blocks.

use crate::{
    config::{ConfigError, DatasourceRecord},
    driver::DatabaseKind,
    path::{deployment_config, lib_dir},
};

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Injects a shared driver and datasource blocks into clones.
#[derive(Debug, Clone, Copy)]
pub struct DatasourceInjector<'driver> {
    kind: DatabaseKind,
    driver: &'driver [u8],
}

impl<'driver> DatasourceInjector<'driver> {
    /// Construct new injector over fetched driver bytes.
    pub fn new(kind: DatabaseKind, driver: &'driver [u8]) -> Self {
        Self { kind, driver }
    }

    /// Install driver and append datasource block into target clone.
    ///
    /// Library and configuration directories are created when missing. So is
    /// the configuration file itself.
    ///
    /// # Errors
    ///
    /// - Return [`InjectError::CreateDir`] if a directory cannot be created.
    /// - Return [`InjectError::WriteDriver`] if driver cannot be written.
    /// - Return [`InjectError::Config`] if datasource block cannot be
    ///   serialized.
    /// - Return [`InjectError::AppendConfig`] if configuration file cannot be
    ///   appended to.
    #[instrument(skip(self, clone, record), level = "debug")]
    pub fn inject(&self, clone: impl AsRef<Path>, record: &DatasourceRecord) -> Result<()> {
        let clone = clone.as_ref();
        info!(
            "add datasource {:?} to {:?}",
            record.id,
            clone.display()
        );

        let lib = lib_dir(clone);
        ensure_dir(&lib)?;
        let jar = lib.join(self.kind.jar_name());
        debug!("write {} byte driver to {:?}", self.driver.len(), jar.display());
        fs::write(&jar, self.driver).map_err(|source| InjectError::WriteDriver {
            source,
            path: jar.clone(),
        })?;

        let config = deployment_config(clone);
        if let Some(conf) = config.parent() {
            ensure_dir(conf)?;
        }
        append_block(&config, &record.to_block()?)
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    mkdirp::mkdirp(path).map_err(|source| InjectError::CreateDir {
        source,
        path: path.to_path_buf(),
    })?;

    Ok(())
}

fn append_block(config: &Path, block: &str) -> Result<()> {
    let append_error = |source: std::io::Error| InjectError::AppendConfig {
        source,
        path: config.to_path_buf(),
    };

    // INVARIANT: Block header must start on its own line.
    let needs_newline = match fs::read(config) {
        Ok(data) => data.last().is_some_and(|byte| *byte != b'\n'),
        Err(error) if error.kind() == ErrorKind::NotFound => false,
        Err(error) => return Err(append_error(error)),
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config)
        .map_err(append_error)?;
    if needs_newline {
        file.write_all(b"\n").map_err(append_error)?;
    }
    file.write_all(block.as_bytes()).map_err(append_error)?;

    Ok(())
}

/// Datasource injection error types.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    /// Directory inside clone cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Driver library cannot be written.
    #[error("failed to write driver to {:?}", path.display())]
    WriteDriver {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration file cannot be appended to.
    #[error("failed to append datasource to {:?}", path.display())]
    AppendConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Datasource block cannot be serialized.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Friendly result alias :3
pub type Result<T, E = InjectError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatasourceTable, PoolOptions};
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    fn record(id: &str) -> DatasourceRecord {
        DatasourceRecord {
            id: id.into(),
            url: "jdbc:postgresql://localhost:5432/shared".into(),
            username: "admin".into(),
            password: "admin".into(),
            driver: DatabaseKind::Postgresql.driver_class().into(),
            pool_options: PoolOptions::default(),
        }
    }

    #[sealed_test]
    fn inject_creates_missing_layout() -> anyhow::Result<()> {
        fs::create_dir("clone")?;
        let injector = DatasourceInjector::new(DatabaseKind::Postgresql, b"driver-bytes");

        injector.inject("clone", &record("SHARED_DB"))?;

        assert_eq!(fs::read("clone/lib/postgresql-jdbc-driver.jar")?, b"driver-bytes");
        let table: DatasourceTable = fs::read_to_string("clone/conf/deployment.toml")?.parse()?;
        assert_eq!(table.datasources, vec![record("SHARED_DB")]);

        Ok(())
    }

    #[sealed_test]
    fn inject_appends_after_existing_content() -> anyhow::Result<()> {
        fs::create_dir_all("clone/conf")?;
        fs::create_dir_all("clone/lib")?;
        fs::write("clone/lib/other.jar", "other")?;
        fs::write("clone/conf/deployment.toml", "[server]\nhostname = \"localhost\"")?;
        let injector = DatasourceInjector::new(DatabaseKind::Postgresql, b"driver-bytes");

        injector.inject("clone", &record("FIRST_DB"))?;
        injector.inject("clone", &record("SECOND_DB"))?;

        let contents = fs::read_to_string("clone/conf/deployment.toml")?;
        assert!(contents.starts_with("[server]\nhostname = \"localhost\"\n[[datasource]]\n"));
        let table: DatasourceTable = contents.parse()?;
        assert_eq!(table.datasources, vec![record("FIRST_DB"), record("SECOND_DB")]);
        assert_eq!(fs::read_to_string("clone/lib/other.jar")?, "other");

        Ok(())
    }
}
