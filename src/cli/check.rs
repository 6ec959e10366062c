//! Report the latest published release.
//!
//! Nothing is downloaded or changed. The installed version comes from the
//! version record.

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use serde::Serialize;

use super::CliConfig;
use crate::resolver::VersionResolver;
use crate::utils::build_http_client;
use crate::version_record::VersionRecord;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Show the latest published release without installing it.
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    latest: String,
    installed: Option<String>,
    artifact_url: String,
    update_available: bool,
}

impl CheckCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let config = cli.load_updater_config().await?;
        let resolver = VersionResolver::from_config(build_http_client()?, &config)?;
        let installed = VersionRecord::new(config.version_record_path()).read().await?;

        let resolution = resolver.resolve().await?;
        let report = CheckReport {
            update_available: installed != resolution.version,
            latest: resolution.version,
            installed: (!installed.is_empty()).then_some(installed),
            artifact_url: resolution.artifact_url.to_string(),
        };

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text => print_text(&report),
        }
        Ok(())
    }
}

fn print_text(report: &CheckReport) {
    println!("Latest:    {}", report.latest.green());
    println!(
        "Installed: {}",
        report.installed.as_deref().unwrap_or("(none recorded)")
    );
    println!("Artifact:  {}", report.artifact_url);
    if report.update_available {
        println!("\n📦 {}", "Update available".yellow());
    } else {
        println!("\n✅ Up to date");
    }
}
