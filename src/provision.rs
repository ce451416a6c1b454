// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Server installation provisioning.
//!
//! A provisioning run turns one server archive into several independent
//! __clones__ of the installation it contains. Optionally, every clone gets
//! wired to a datastore along the way.
//!
//! # Pipeline
//!
//! Each run is a fixed, linear sequence of steps:
//!
//! 1. __Validate__: the archive must exist, and the clone count must be a
//!    positive integer.
//! 2. __Extract__: the archive is unpacked into a __staging directory__ named
//!    after the archive, placed in the working directory.
//! 3. __Fetch__: if datasources were requested, the database driver is
//!    downloaded once.
//! 4. __Clone__: the staging directory is copied into `<base>_clone_<i>` beside
//!    the archive for every index `i`, in increasing order. If datasources
//!    were requested, the driver and a datasource block are injected into
//!    each clone right after it is copied.
//! 5. __Cleanup__: the staging directory is removed.
//!
//! # Failure Behavior
//!
//! Invalid input aborts the run before anything touches the file system. A
//! failed driver download aborts the run before any clone is made, and the
//! staging directory is removed first. Once cloning starts, any failure aborts
//! the run as is: clones created so far and the staging directory are left in
//! place. Created clones are never rolled back.

pub mod extract;
pub mod inject;
pub mod replicate;

use crate::{
    config::{DatasourceRecord, ProvisionPlan},
    driver::{DatabaseKind, DriverError, DriverSource, HttpDriverSource},
    path::{archive_parent_dir, clone_dir, staging_dir_name},
    provision::{extract::extract_archive, inject::DatasourceInjector, replicate::copy_tree},
};

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{info, instrument, warn};

/// Number of clones to produce.
///
/// Always a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CloneCount(NonZeroUsize);

impl CloneCount {
    /// Treat clone count as plain integer.
    pub fn get(&self) -> usize {
        self.0.get()
    }
}

impl FromStr for CloneCount {
    type Err = ProvisionError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        data.trim()
            .parse::<i64>()
            .ok()
            .and_then(|count| Self::try_from(count).ok())
            .ok_or_else(|| ProvisionError::InvalidCloneCount {
                input: data.trim().to_string(),
            })
    }
}

impl TryFrom<i64> for CloneCount {
    type Error = ProvisionError;

    fn try_from(count: i64) -> Result<Self, Self::Error> {
        usize::try_from(count)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Self)
            .ok_or_else(|| ProvisionError::InvalidCloneCount {
                input: count.to_string(),
            })
    }
}

impl Display for CloneCount {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.0)
    }
}

/// Datasource wiring for a provisioning run.
///
/// Holds one record per clone, in clone order. All clones share the same
/// database type, and thus the same driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourcePlan {
    /// Database type whose driver gets installed.
    pub database: DatabaseKind,

    /// Datasource record of each clone.
    pub records: Vec<DatasourceRecord>,
}

impl DatasourcePlan {
    /// Construct new datasource plan.
    ///
    /// Records without a driver class get the driver class of the database
    /// type.
    pub fn new(database: DatabaseKind, records: impl IntoIterator<Item = DatasourceRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|mut record| {
                if record.driver.trim().is_empty() {
                    record.driver = database.driver_class().into();
                }
                record
            })
            .collect();

        Self { database, records }
    }
}

/// Validated provisioning configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    archive: PathBuf,
    clones: CloneCount,
    datasources: Option<DatasourcePlan>,
}

impl ProvisionConfig {
    /// Construct new provisioning configuration without datasources.
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::ArchiveMissing`] if archive is not an
    ///   existing file.
    pub fn new(archive: impl Into<PathBuf>, clones: CloneCount) -> Result<Self> {
        Ok(Self {
            archive: existing_archive(archive)?,
            clones,
            datasources: None,
        })
    }

    /// Construct new provisioning configuration from raw user input.
    ///
    /// The archive is checked before the clone count.
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::ArchiveMissing`] if archive is not an
    ///   existing file.
    /// - Return [`ProvisionError::InvalidCloneCount`] if clone count is not a
    ///   positive integer.
    pub fn parse(archive: impl Into<PathBuf>, clones: &str) -> Result<Self> {
        let archive = existing_archive(archive)?;
        let clones = clones.parse()?;

        Ok(Self {
            archive,
            clones,
            datasources: None,
        })
    }

    /// Attach datasource wiring to configuration.
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::DatasourceCount`] if there is not exactly one
    ///   record per clone.
    pub fn with_datasources(mut self, plan: DatasourcePlan) -> Result<Self> {
        if plan.records.len() != self.clones.get() {
            return Err(ProvisionError::DatasourceCount {
                expect: self.clones.get(),
                found: plan.records.len(),
            });
        }
        self.datasources = Some(plan);

        Ok(self)
    }

    /// Path to archive to clone.
    pub fn archive(&self) -> &Path {
        self.archive.as_path()
    }

    /// Number of clones to produce.
    pub fn clones(&self) -> CloneCount {
        self.clones
    }

    /// Datasource wiring, if any.
    pub fn datasources(&self) -> Option<&DatasourcePlan> {
        self.datasources.as_ref()
    }
}

impl TryFrom<ProvisionPlan> for ProvisionConfig {
    type Error = ProvisionError;

    fn try_from(plan: ProvisionPlan) -> Result<Self, Self::Error> {
        let archive = existing_archive(plan.archive)?;
        let clones = CloneCount::try_from(plan.clones)?;
        let config = Self {
            archive,
            clones,
            datasources: None,
        };

        match plan.datasource {
            Some(layout) => {
                let database = layout.database.parse()?;
                config.with_datasources(DatasourcePlan::new(database, layout.records))
            }
            None => Ok(config),
        }
    }
}

fn existing_archive(archive: impl Into<PathBuf>) -> Result<PathBuf> {
    let archive = archive.into();
    if !archive.is_file() {
        return Err(ProvisionError::ArchiveMissing { path: archive });
    }

    Ok(archive)
}

/// Outcome of a successful provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Staging directory that was used, and removed, during the run.
    pub staging: PathBuf,

    /// Created clone directories in index order.
    pub clones: Vec<PathBuf>,
}

/// Provisioning pipeline executor.
///
/// Extracts archives into a working directory, and produces clones through
/// a [`DriverSource`] for any datasource drivers that are needed.
#[derive(Debug)]
pub struct Provisioner<S = HttpDriverSource>
where
    S: DriverSource,
{
    source: S,
    workdir: PathBuf,
}

impl<S> Provisioner<S>
where
    S: DriverSource,
{
    /// Construct new provisioner staging into current working directory.
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::WorkDir`] if current working directory
    ///   cannot be determined.
    pub fn new(source: S) -> Result<Self> {
        let workdir = std::env::current_dir().map_err(ProvisionError::WorkDir)?;
        Ok(Self::with_workdir(source, workdir))
    }

    /// Construct new provisioner staging into target directory.
    pub fn with_workdir(source: S, workdir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            workdir: workdir.into(),
        }
    }

    /// Driver source used for datasource drivers.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Execute provisioning run.
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::StagingExists`] if staging directory is
    ///   already present.
    /// - Return [`ProvisionError::Driver`] if driver cannot be fetched.
    /// - Return [`ProvisionError::AbortCleanup`] if driver cannot be fetched,
    ///   and staging directory cannot be removed afterwards.
    /// - Return [`ProvisionError::DatasourceCount`] if a clone has no
    ///   datasource record to inject.
    /// - Return [`ProvisionError::Extract`] if archive cannot be extracted.
    /// - Return [`ProvisionError::Copy`] if a clone cannot be produced.
    /// - Return [`ProvisionError::Inject`] if a datasource cannot be injected.
    /// - Return [`ProvisionError::Cleanup`] if staging directory cannot be
    ///   removed.
    #[instrument(skip(self, config), level = "debug")]
    pub fn run(&self, config: &ProvisionConfig) -> Result<ProvisionReport> {
        let archive = config.archive();
        let base = staging_dir_name(archive)?;
        let staging = self.workdir.join(&base);
        if staging.exists() {
            return Err(ProvisionError::StagingExists { path: staging });
        }
        let parent = archive_parent_dir(archive)?;

        extract_archive(archive, &staging)?;

        let wiring = match config.datasources() {
            Some(plan) => match self.source.fetch(plan.database) {
                Ok(driver) => Some((plan, driver)),
                Err(error) => {
                    warn!("driver fetch failed: {error}");
                    warn!("discard staging directory {:?}", staging.display());
                    if let Err(source) = fs::remove_dir_all(&staging) {
                        return Err(ProvisionError::AbortCleanup {
                            source,
                            path: staging,
                            driver: error,
                        });
                    }
                    return Err(error.into());
                }
            },
            None => None,
        };
        let injection = wiring
            .as_ref()
            .map(|(plan, driver)| (*plan, DatasourceInjector::new(plan.database, driver)));

        let count = config.clones().get();
        let bar = ProgressBar::new(count as u64);
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);

        let mut clones = Vec::with_capacity(count);
        for index in 1..=count {
            let clone = clone_dir(&parent, &base, index);
            bar.set_message(clone.display().to_string());

            copy_tree(&staging, &clone)?;
            bar.suspend(|| info!("clone {index} created: {:?}", clone.display()));

            if let Some((plan, injector)) = &injection {
                let record = plan.records.get(index - 1).ok_or_else(|| {
                    ProvisionError::DatasourceCount {
                        expect: count,
                        found: plan.records.len(),
                    }
                })?;
                bar.suspend(|| injector.inject(&clone, record))?;
            }

            clones.push(clone);
            bar.inc(1);
        }
        bar.finish_and_clear();

        remove_staging(&staging)?;
        info!("provisioned {count} clones of {:?}", archive.display());

        Ok(ProvisionReport { staging, clones })
    }
}

fn remove_staging(staging: &Path) -> Result<()> {
    info!("remove staging directory {:?}", staging.display());
    fs::remove_dir_all(staging).map_err(|source| ProvisionError::Cleanup {
        source,
        path: staging.to_path_buf(),
    })
}

/// All possible error types of a provisioning run.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Archive does not exist.
    #[error("file {:?} does not exist", path.display())]
    ArchiveMissing { path: PathBuf },

    /// Clone count is not a positive integer.
    #[error("cloning number must be a positive integer, got {input:?}")]
    InvalidCloneCount { input: String },

    /// Datasource records do not line up with clones.
    #[error("expected one datasource record per clone ({expect}), found {found}")]
    DatasourceCount { expect: usize, found: usize },

    /// Staging directory is already present.
    #[error("staging directory {:?} already exists", path.display())]
    StagingExists { path: PathBuf },

    /// Current working directory cannot be determined.
    #[error("failed to determine current working directory")]
    WorkDir(#[source] std::io::Error),

    /// Staging directory cannot be removed.
    #[error("failed to remove staging directory {:?}", path.display())]
    Cleanup {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Driver download fails, and staging directory cannot be removed
    /// afterwards.
    #[error(
        "failed to remove staging directory {:?} after driver download failed: {driver}",
        path.display()
    )]
    AbortCleanup {
        #[source]
        source: std::io::Error,
        path: PathBuf,
        driver: DriverError,
    },

    /// Driver lookup or download fails.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Provisioning paths cannot be resolved.
    #[error(transparent)]
    Path(#[from] crate::path::PathError),

    /// Archive extraction fails.
    #[error(transparent)]
    Extract(#[from] extract::ExtractError),

    /// Clone cannot be produced.
    #[error(transparent)]
    Copy(#[from] replicate::CopyError),

    /// Datasource injection fails.
    #[error(transparent)]
    Inject(#[from] inject::InjectError),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

impl ProvisionError {
    /// Check if error stems from bad user input or an unusable driver rather
    /// than a file system failure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::ArchiveMissing { .. }
                | Self::InvalidCloneCount { .. }
                | Self::DatasourceCount { .. }
                | Self::StagingExists { .. }
                | Self::Driver(_)
        )
    }
}

/// Friendly result alias :3
pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;
