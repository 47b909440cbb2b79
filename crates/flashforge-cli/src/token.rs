//! `flashforge token`

use std::process::ExitCode;

use anyhow::{anyhow, Result};
use chrono::Duration;
use flashforge_core::{StoredToken, StoredTokenProvider, TokenProvider};

use crate::cli::TokenAction;

pub async fn run(action: TokenAction) -> Result<ExitCode> {
    let path = StoredTokenProvider::default_path()
        .ok_or_else(|| anyhow!("no config directory on this system"))?;
    let store = StoredTokenProvider::new(path).await?;

    match action {
        TokenAction::Set { token, expires_in } => {
            store
                .store(StoredToken::new(token, expires_in.map(Duration::seconds)))
                .await?;
            eprintln!("Token saved to {}", store.storage_path().display());
        }
        TokenAction::Status => {
            let usable = store.session_token().await?.is_some();
            match store.current().await {
                None => {
                    eprintln!("No token stored");
                    return Ok(ExitCode::FAILURE);
                }
                Some(token) if !usable => {
                    eprintln!("Stored token expired at {:?}", token.expires_at);
                    return Ok(ExitCode::FAILURE);
                }
                Some(token) => match token.expires_at {
                    Some(at) => eprintln!("Token valid until {}", at),
                    None => eprintln!("Token valid (no expiry)"),
                },
            }
        }
        TokenAction::Clear => {
            store.clear().await?;
            eprintln!("Token removed");
        }
    }
    Ok(ExitCode::SUCCESS)
}
