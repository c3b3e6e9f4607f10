//! serline: command line monitor for CRLF-framed serial devices
//!
//! Connects to a device exposed over TCP or a Unix socket, prints the lines
//! it sends, and writes lines to it.

mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use serline_utils::{init_logging_with_config, LogConfig, LogOutput};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::development()
    } else {
        LogConfig::cli()
    };
    if cli.log_file {
        log_config.output = LogOutput::Both;
    }
    if let Err(e) = init_logging_with_config(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let exit_code = match commands::execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(kind = ?e.kind(), "Command failed");
            eprintln!("{}", e);
            1
        }
    };

    std::process::exit(exit_code);
}
