//! Command-line definitions

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use flashforge_core::EncodingPreference;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "flashforge", version, about = "Generate flashcards from a prompt")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: <config dir>/flashforge/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate flashcards, printing each one as soon as it is complete
    Generate(GenerateArgs),
    /// Run a captured response body through the extractor offline
    Replay(ReplayArgs),
    /// Manage the stored session token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// What the cards should cover (at most 250 characters)
    pub prompt: String,

    /// Number of cards to ask for
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: usize,

    /// Ask the backend for a title
    #[arg(long)]
    pub title: bool,

    /// Wait for the complete response instead of streaming
    #[arg(long)]
    pub no_stream: bool,

    /// Backend endpoint (overrides config and FLASHFORGE_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<Url>,

    /// Session token (otherwise FLASHFORGE_TOKEN, then the stored token)
    #[arg(long)]
    pub token: Option<String>,

    /// Wire encoding: auto, flat or event-stream
    #[arg(long)]
    pub encoding: Option<EncodingPreference>,

    /// Seconds to wait for the next chunk before giving up
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print one JSON object per line
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Captured response body
    pub file: PathBuf,

    /// Wire encoding: auto (sniffed from the file), flat or event-stream
    #[arg(long, default_value = "auto")]
    pub encoding: EncodingPreference,

    /// Bytes per replayed chunk
    #[arg(long, default_value_t = 64)]
    pub chunk_size: usize,

    /// Print one JSON object per line
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum TokenAction {
    /// Store a session token
    Set {
        token: String,
        /// Seconds until the token expires
        #[arg(long)]
        expires_in: Option<i64>,
    },
    /// Show whether a usable token is stored
    Status,
    /// Remove the stored token
    Clear,
}
