// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Interactive input collection.
//!
//! Asks the user for everything a provisioning run needs, and validates each
//! answer as soon as it is given so that bad input aborts the run before any
//! file system work happens.

use crate::{
    config::{DatasourceRecord, PoolOptions},
    driver::{DatabaseKind, DriverError},
    provision::{CloneCount, DatasourcePlan, ProvisionConfig, ProvisionError},
};

use inquire::{Confirm, CustomType, InquireError, Password, Text};
use tracing::{debug, instrument};

/// Collects a provisioning configuration through terminal prompts.
#[derive(Debug, Default, Clone, Copy)]
pub struct InputCollector;

impl InputCollector {
    /// Construct new input collector.
    pub fn new() -> Self {
        Self
    }

    /// Prompt for a complete provisioning configuration.
    ///
    /// Asks for archive and clone count first, then whether clones should be
    /// wired to a datastore. If so, the database type is asked for once, and
    /// a datasource record is asked for each clone.
    ///
    /// # Errors
    ///
    /// - Return [`PromptError::Provision`] if archive or clone count are
    ///   invalid.
    /// - Return [`PromptError::Driver`] if database type is unsupported.
    /// - Return [`PromptError::Inquire`] if prompting fails or is canceled.
    #[instrument(skip(self), level = "debug")]
    pub fn collect(&self) -> Result<ProvisionConfig> {
        let archive = Text::new("Enter zip file name:").prompt()?;
        let clones = Text::new("Enter cloning number:").prompt()?;
        let config = ProvisionConfig::parse(archive.trim(), &clones)?;

        let wire = Confirm::new("Attach a datasource to each clone?")
            .with_default(false)
            .prompt()?;
        if !wire {
            return Ok(config);
        }

        let plan = self.collect_datasources(config.clones())?;
        Ok(config.with_datasources(plan)?)
    }

    fn collect_datasources(&self, clones: CloneCount) -> Result<DatasourcePlan> {
        let database: DatabaseKind = Text::new("Enter database type:")
            .with_help_message("mysql or postgresql")
            .prompt()?
            .parse()?;
        debug!("selected {database} driver");

        let records = (1..=clones.get())
            .map(|index| self.collect_record(index, database))
            .collect::<Result<Vec<_>>>()?;

        Ok(DatasourcePlan::new(database, records))
    }

    fn collect_record(&self, index: usize, database: DatabaseKind) -> Result<DatasourceRecord> {
        let defaults = PoolOptions::default();
        let heading = format!("[clone {index}]");

        let id = Text::new(&format!("{heading} Enter datasource id:")).prompt()?;
        let url = Text::new(&format!("{heading} Enter datasource url:")).prompt()?;
        let username = Text::new(&format!("{heading} Enter username:")).prompt()?;
        let password = Password::new(&format!("{heading} Enter password:"))
            .without_confirmation()
            .prompt()?;
        let max_active = CustomType::<u32>::new(&format!("{heading} Enter max active connections:"))
            .with_default(defaults.max_active)
            .with_error_message("expected a non-negative integer")
            .prompt()?;
        let max_wait = CustomType::<u64>::new(&format!("{heading} Enter max wait in milliseconds:"))
            .with_default(defaults.max_wait)
            .with_error_message("expected a non-negative integer")
            .prompt()?;
        let test_on_borrow = Confirm::new(&format!("{heading} Test connections on borrow?"))
            .with_default(defaults.test_on_borrow)
            .prompt()?;

        Ok(DatasourceRecord {
            id,
            url,
            username,
            password,
            driver: database.driver_class().into(),
            pool_options: PoolOptions {
                max_active,
                max_wait,
                test_on_borrow,
            },
        })
    }
}

/// Input collection error types.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Prompt fails or user cancels it.
    #[error(transparent)]
    Inquire(#[from] InquireError),

    /// Database type is unsupported.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Collected input is invalid.
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

impl PromptError {
    /// Check if error stems from user input rather than terminal failure.
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Inquire(error) => matches!(
                error,
                InquireError::OperationCanceled | InquireError::OperationInterrupted
            ),
            Self::Driver(_) => true,
            Self::Provision(error) => error.is_user_error(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = PromptError> = std::result::Result<T, E>;
