//! bedrock-updater entry point
//!
//! Parses the command line, runs the selected command and turns failures
//! into a readable message with a non-zero exit code.

use anyhow::Result;
use bedrock_updater::cli;
use bedrock_updater::core::user_friendly_error;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
