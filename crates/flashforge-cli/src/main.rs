//! Flashforge - generate flashcards from a prompt, card by card

mod cli;
mod generate;
mod output;
mod replay;
mod token;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Generate(args) => generate::run(args, cli.config.as_deref()).await,
        Command::Replay(args) => replay::run(args).await,
        Command::Token { action } => token::run(action).await,
    }
}

/// Logs go to stderr so stdout carries only cards
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "flashforge=warn,flashforge_core=warn",
        1 => "flashforge=info,flashforge_core=info",
        _ => "flashforge=debug,flashforge_core=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
