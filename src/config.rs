// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration data that srvclone reads and writes to
//! simplify the process of serialization and deserialization. File I/O is left
//! to the caller to figure out.
//!
//! # Datasource Blocks
//!
//! Each clone of a server installation can be wired to a datastore through a
//! __datasource block__ appended to the clone's `conf/deployment.toml`. A
//! block is an entry of the `datasource` array of tables:
//!
//! ```toml
//! [[datasource]]
//! id = "WSO2AM_DB"
//! url = "jdbc:mysql://localhost:3306/am_db"
//! username = "root"
//! password = "root"
//! driver = "com.mysql.cj.jdbc.Driver"
//!
//! [datasource.pool_options]
//! maxActive = 50
//! maxWait = 60000
//! testOnBorrow = true
//! ```
//!
//! Blocks are produced through the TOML serializer, never through string
//! interpolation. Thus, quotes or newlines in any field are escaped instead of
//! corrupting the configuration file.
//!
//! # Plan Files
//!
//! A __plan file__ lists everything the interactive prompts would otherwise
//! ask for, so a provisioning run can be repeated without typing it all in
//! again.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Connection parameters for one datasource.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DatasourceRecord {
    /// Identifier the server uses to look up the datasource.
    pub id: String,

    /// JDBC connection URL.
    pub url: String,

    /// User to connect as.
    pub username: String,

    /// Password of connecting user.
    pub password: String,

    /// Fully qualified driver class name.
    ///
    /// May be left out of plan files, in which case the driver class of the
    /// selected database type is filled in.
    #[serde(default)]
    pub driver: String,

    /// Connection pool tuning.
    pub pool_options: PoolOptions,
}

impl DatasourceRecord {
    /// Render record as a standalone `[[datasource]]` block.
    ///
    /// The block always ends with a blank line so consecutive blocks stay
    /// visually separated once appended to a configuration file.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Serialize`] if TOML serialization fails.
    pub fn to_block(&self) -> Result<String> {
        let table = DatasourceTable {
            datasources: vec![self.clone()],
        };
        let mut block = toml::to_string(&table)?;
        if !block.ends_with('\n') {
            block.push('\n');
        }
        block.push('\n');

        Ok(block)
    }
}

impl Display for DatasourceRecord {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.to_block()?.as_str())
    }
}

/// Connection pool options of a datasource.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PoolOptions {
    /// Maximum number of active connections.
    #[serde(rename = "maxActive")]
    pub max_active: u32,

    /// Maximum time to wait for a free connection in milliseconds.
    #[serde(rename = "maxWait")]
    pub max_wait: u64,

    /// Validate connections before handing them out.
    #[serde(rename = "testOnBorrow")]
    pub test_on_borrow: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_active: 50,
            max_wait: 60000,
            test_on_borrow: true,
        }
    }
}

/// Datasource listing of a server configuration file.
///
/// Unrelated keys of the configuration file are ignored when deserializing.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DatasourceTable {
    /// All datasource blocks in order of appearance.
    #[serde(rename = "datasource", default)]
    pub datasources: Vec<DatasourceRecord>,
}

impl FromStr for DatasourceTable {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        toml::from_str(data).map_err(ConfigError::Deserialize)
    }
}

/// Provisioning plan layout.
///
/// Raw, unvalidated form of a provisioning run. Validation of archive
/// existence, clone count, and database type happens when the plan is turned
/// into a provisioning configuration.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ProvisionPlan {
    /// Path to server archive to clone.
    pub archive: PathBuf,

    /// Number of clones to produce.
    pub clones: i64,

    /// Optional datasource wiring for each clone.
    pub datasource: Option<DatasourceLayout>,
}

impl FromStr for ProvisionPlan {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut plan: ProvisionPlan = toml::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on archive path.
        plan.archive = PathBuf::from(
            shellexpand::full(plan.archive.to_string_lossy().as_ref())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned(),
        );

        Ok(plan)
    }
}

impl Display for ProvisionPlan {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Datasource section of a plan file.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DatasourceLayout {
    /// Database type whose driver gets installed, e.g., "mysql".
    pub database: String,

    /// One record per clone, in clone order.
    #[serde(rename = "record", default)]
    pub records: Vec<DatasourceRecord>,
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    fn mysql_record() -> DatasourceRecord {
        DatasourceRecord {
            id: "WSO2AM_DB".into(),
            url: "jdbc:mysql://localhost:3306/am_db".into(),
            username: "root".into(),
            password: "root".into(),
            driver: "com.mysql.cj.jdbc.Driver".into(),
            pool_options: PoolOptions {
                max_active: 80,
                max_wait: 30000,
                test_on_borrow: false,
            },
        }
    }

    #[test]
    fn datasource_block_layout() -> anyhow::Result<()> {
        let block = mysql_record().to_block()?;

        assert!(block.starts_with("[[datasource]]\n"));
        assert!(block.ends_with("\n\n"));
        assert!(block.contains("id = \"WSO2AM_DB\""));
        assert!(block.contains("maxActive = 80"));
        assert!(block.contains("maxWait = 30000"));
        assert!(block.contains("testOnBorrow = false"));

        let table: DatasourceTable = block.parse()?;
        assert_eq!(table.datasources, vec![mysql_record()]);

        Ok(())
    }

    #[test]
    fn datasource_block_escapes_quotes() -> anyhow::Result<()> {
        let mut record = mysql_record();
        record.password = "p\"ss\nword = \"x\"".into();
        record.url = "jdbc:mysql://host/db?opt=\"1\"".into();

        let table: DatasourceTable = record.to_string().parse()?;
        assert_eq!(table.datasources, vec![record]);

        Ok(())
    }

    #[test]
    fn datasource_table_ignores_unrelated_keys() -> anyhow::Result<()> {
        let data = indoc::indoc! {r#"
            [server]
            hostname = "localhost"

            [[datasource]]
            id = "WSO2_SHARED_DB"
            url = "jdbc:postgresql://localhost:5432/shared"
            username = "admin"
            password = "admin"
            driver = "org.postgresql.Driver"
            pool_options.maxActive = 10
            pool_options.maxWait = 1000
            pool_options.testOnBorrow = true
        "#};

        let table: DatasourceTable = data.parse()?;
        assert_eq!(table.datasources.len(), 1);
        assert_eq!(table.datasources[0].id, "WSO2_SHARED_DB");
        assert_eq!(table.datasources[0].pool_options.max_active, 10);

        Ok(())
    }

    #[sealed_test(env = [("DIST", "/opt/dist")])]
    fn deserialize_provision_plan() -> anyhow::Result<()> {
        let result: ProvisionPlan = r#"
            archive = "$DIST/wso2am-4.2.0.zip"
            clones = 2

            [datasource]
            database = "MySQL"

            [[datasource.record]]
            id = "WSO2AM_DB"
            url = "jdbc:mysql://localhost:3306/am_db"
            username = "root"
            password = "root"
            pool_options = { maxActive = 50, maxWait = 60000, testOnBorrow = true }
        "#
        .parse()?;

        let expect = ProvisionPlan {
            archive: PathBuf::from("/opt/dist/wso2am-4.2.0.zip"),
            clones: 2,
            datasource: Some(DatasourceLayout {
                database: "MySQL".into(),
                records: vec![DatasourceRecord {
                    id: "WSO2AM_DB".into(),
                    url: "jdbc:mysql://localhost:3306/am_db".into(),
                    username: "root".into(),
                    password: "root".into(),
                    driver: String::new(),
                    pool_options: PoolOptions::default(),
                }],
            }),
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn provision_plan_without_datasource() -> anyhow::Result<()> {
        let plan: ProvisionPlan = "archive = \"app.zip\"\nclones = 3\n".parse()?;
        assert_eq!(plan.archive, PathBuf::from("app.zip"));
        assert_eq!(plan.clones, 3);
        assert_eq!(plan.datasource, None);

        let again: ProvisionPlan = plan.to_string().parse()?;
        assert_eq!(again, plan);

        Ok(())
    }

    #[test]
    fn provision_plan_rejects_missing_fields() {
        let result = "clones = 3\n".parse::<ProvisionPlan>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }
}
