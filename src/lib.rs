// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Provision isolated clones of a server installation.
//!
//! srvclone extracts a server archive into a staging directory, copies that
//! staging directory into any number of independent clones beside the archive,
//! and optionally wires each clone to a datastore by installing a JDBC driver
//! and appending a datasource block to the clone's `conf/deployment.toml`.
//!
//! # See Also
//!
//! 1. [`provision`] for the pipeline itself.
//! 2. [`prompt`] for interactive input collection.
//! 3. [`config`] for the plan file and datasource block layouts.

pub mod config;
pub mod driver;
pub mod path;
pub mod prompt;
pub mod provision;

pub use config::{DatasourceRecord, PoolOptions, ProvisionPlan};
pub use driver::{DatabaseKind, DriverSource, HttpDriverSource};
pub use prompt::InputCollector;
pub use provision::{
    CloneCount, DatasourcePlan, ProvisionConfig, ProvisionError, ProvisionReport, Provisioner,
};
