// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Database driver retrieval.
//!
//! Clones that get wired to a datastore need the JDBC driver of that
//! datastore in their library directory. Only a small, fixed set of database
//! types is supported. Each one maps to a single hard-coded download location.
//! The driver is fetched once per provisioning run and buffered fully in
//! memory, so the same bytes can be written into every clone.

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
    time::Duration,
};
use tracing::{info, instrument};

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    /// MySQL through MySQL Connector/J.
    Mysql,

    /// PostgreSQL through pgJDBC.
    Postgresql,
}

impl DatabaseKind {
    /// Lower-case name of database type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgresql",
        }
    }

    /// Fixed download location of driver library.
    pub fn download_url(&self) -> &'static str {
        match self {
            Self::Mysql => {
                "https://repo1.maven.org/maven2/mysql/mysql-connector-java/8.0.28/mysql-connector-java-8.0.28.jar"
            }
            Self::Postgresql => "https://jdbc.postgresql.org/download/postgresql-42.3.3.jar",
        }
    }

    /// Fully qualified driver class name to reference in datasource blocks.
    pub fn driver_class(&self) -> &'static str {
        match self {
            Self::Mysql => "com.mysql.cj.jdbc.Driver",
            Self::Postgresql => "org.postgresql.Driver",
        }
    }

    /// File name of driver library inside a clone's library directory.
    pub fn jar_name(&self) -> String {
        format!("{}-jdbc-driver.jar", self.name())
    }
}

impl FromStr for DatabaseKind {
    type Err = DriverError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::Mysql),
            "postgresql" => Ok(Self::Postgresql),
            _ => Err(DriverError::Unsupported {
                name: data.trim().to_string(),
            }),
        }
    }
}

impl Display for DatabaseKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.name())
    }
}

/// Layer of indirection for driver retrieval.
pub trait DriverSource {
    /// Fetch full driver library of target database type.
    fn fetch(&self, kind: DatabaseKind) -> Result<Vec<u8>>;
}

/// Driver retrieval over HTTP.
///
/// Performs a single unauthenticated GET request per fetch. No retries are
/// attempted, and the default client timeout applies.
#[derive(Debug, Clone)]
pub struct HttpDriverSource {
    client: Client,
}

impl HttpDriverSource {
    /// Construct new HTTP driver source.
    ///
    /// # Errors
    ///
    /// - Return [`DriverError::Request`] if HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Construct HTTP driver source from existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Download full body at target URL.
    ///
    /// Displays a spinner while the download is in flight.
    ///
    /// # Errors
    ///
    /// - Return [`DriverError::Request`] if request cannot be completed.
    /// - Return [`DriverError::Status`] if server answers with non-success.
    /// - Return [`DriverError::IndicatifStyleTemplate`] if spinner style is
    ///   invalid.
    #[instrument(skip(self), level = "debug")]
    pub fn fetch_url(&self, url: &str) -> Result<Vec<u8>> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::with_template(
            "{elapsed_precise:.green}  {spinner:.yellow}  {msg}",
        )?);
        spinner.set_message(url.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        let result = self.download(url);
        spinner.finish_and_clear();

        let body = result?;
        info!("downloaded {} bytes from {url}", body.len());

        Ok(body)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes()?.to_vec())
    }
}

impl DriverSource for HttpDriverSource {
    fn fetch(&self, kind: DatabaseKind) -> Result<Vec<u8>> {
        info!("download {kind} driver");
        self.fetch_url(kind.download_url())
    }
}

/// Driver retrieval error types.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Database type is not in the supported driver table.
    #[error("unsupported database type {name:?}, expected one of \"mysql\" or \"postgresql\"")]
    Unsupported { name: String },

    /// Server answered download request with non-success status.
    #[error("failed to download driver from {url}: server responded with status {status}")]
    Status { url: String, status: u16 },

    /// Download request could not be completed.
    #[error(transparent)]
    Request(#[from] reqwest::Error),

    /// Style template cannot be set for download spinner.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = DriverError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::thread;
    use tiny_http::{Response, Server, StatusCode};

    #[test_case("mysql", DatabaseKind::Mysql; "lower case mysql")]
    #[test_case("MySQL", DatabaseKind::Mysql; "mixed case mysql")]
    #[test_case("  PostgreSQL ", DatabaseKind::Postgresql; "padded postgresql")]
    #[test]
    fn database_kind_parse_ignores_case(input: &str, expect: DatabaseKind) {
        let result = input.parse::<DatabaseKind>();
        assert!(matches!(result, Ok(kind) if kind == expect));
    }

    #[test_case("oracle"; "unknown vendor")]
    #[test_case("postgres"; "alias not in table")]
    #[test_case(""; "empty")]
    #[test]
    fn database_kind_parse_rejects_unsupported(input: &str) {
        let result = input.parse::<DatabaseKind>();
        assert!(matches!(result, Err(DriverError::Unsupported { .. })));
    }

    #[test]
    fn database_kind_driver_table() {
        assert_eq!(DatabaseKind::Mysql.jar_name(), "mysql-jdbc-driver.jar");
        assert_eq!(
            DatabaseKind::Postgresql.jar_name(),
            "postgresql-jdbc-driver.jar"
        );
        assert!(DatabaseKind::Mysql.download_url().starts_with("https://"));
        assert!(DatabaseKind::Postgresql.download_url().starts_with("https://"));
        assert_eq!(DatabaseKind::Postgresql.driver_class(), "org.postgresql.Driver");
    }

    #[test]
    fn http_driver_source_returns_full_body() -> anyhow::Result<()> {
        let server = Server::http("127.0.0.1:0").map_err(|error| anyhow::anyhow!(error))?;
        let addr = server.server_addr();
        let body = vec![0xca, 0xfe, 0xba, 0xbe, 0x00, 0x01];
        let served = body.clone();

        let handle = thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let _ = request.respond(Response::from_data(served));
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        let source = HttpDriverSource::with_client(client);
        let result = source.fetch_url(&format!("http://{addr}/driver.jar"))?;
        assert_eq!(result, body);

        handle.join().map_err(|_| anyhow::anyhow!("server thread panicked"))?;

        Ok(())
    }

    #[test]
    fn http_driver_source_rejects_non_success_status() -> anyhow::Result<()> {
        let server = Server::http("127.0.0.1:0").map_err(|error| anyhow::anyhow!(error))?;
        let addr = server.server_addr();

        let handle = thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let response = Response::from_string("gone").with_status_code(StatusCode(404));
                let _ = request.respond(response);
            }
        });

        let source = HttpDriverSource::new()?;
        let result = source.fetch_url(&format!("http://{addr}/driver.jar"));
        assert!(matches!(result, Err(DriverError::Status { status: 404, .. })));

        handle.join().map_err(|_| anyhow::anyhow!("server thread panicked"))?;

        Ok(())
    }
}
