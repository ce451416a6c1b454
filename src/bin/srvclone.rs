// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use srvclone::{
    prompt::PromptError, HttpDriverSource, InputCollector, ProvisionConfig, ProvisionError,
    ProvisionPlan, Provisioner,
};

use anyhow::{Context, Result};
use clap::Parser;
use std::{fs, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Provision isolated clones of a server installation.
///
/// Without a plan file, everything is asked for interactively.
#[derive(Debug, Clone, Parser)]
#[command(about, long_about, version)]
struct Cli {
    /// Read provisioning plan from TOML file instead of prompting.
    #[arg(short, long, value_name = "path")]
    pub plan: Option<PathBuf>,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config = match self.plan {
            Some(path) => load_plan(path)?,
            None => InputCollector::new().collect()?,
        };

        let provisioner = Provisioner::new(HttpDriverSource::new()?)?;
        let report = provisioner.run(&config)?;
        for clone in report.clones {
            info!("ready: {:?}", clone.display());
        }

        Ok(())
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        if is_user_error(&error) {
            error!("{error}");
        } else {
            error!("{error:?}");
        }
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn load_plan(path: PathBuf) -> Result<ProvisionConfig> {
    let data = fs::read_to_string(&path)
        .with_context(|| format!("failed to read plan file {:?}", path.display()))?;
    let plan: ProvisionPlan = data
        .parse()
        .with_context(|| format!("failed to parse plan file {:?}", path.display()))?;

    Ok(ProvisionConfig::try_from(plan)?)
}

fn is_user_error(error: &anyhow::Error) -> bool {
    if let Some(error) = error.downcast_ref::<ProvisionError>() {
        return error.is_user_error();
    }

    error
        .downcast_ref::<PromptError>()
        .is_some_and(PromptError::is_user_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inquire::InquireError;
    use simple_test_case::test_case;

    #[test_case(ProvisionError::ArchiveMissing { path: "app.zip".into() }.into(), true; "missing archive")]
    #[test_case(PromptError::Inquire(InquireError::OperationCanceled).into(), true; "canceled prompt")]
    #[test_case(PromptError::Inquire(InquireError::NotTTY).into(), false; "no terminal")]
    #[test_case(anyhow::anyhow!("failed to read plan file"), false; "plain context error")]
    #[test]
    fn cli_error_user_classification(error: anyhow::Error, expect: bool) {
        assert_eq!(is_user_error(&error), expect);
    }
}
