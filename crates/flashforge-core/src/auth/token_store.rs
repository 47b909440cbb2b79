//! Token storage on disk
//!
//! Holds the session token for the signed-in identity. Expired tokens are
//! treated as absent; refreshing them is the job of whoever signs in.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::TokenProvider;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Who the token belongs to, for display only
    #[serde(default)]
    pub account: Option<String>,
}

impl StoredToken {
    pub fn new(access_token: impl Into<String>, expires_in: Option<Duration>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: expires_in.map(|d| Utc::now() + d),
            account: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

pub struct StoredTokenProvider {
    token: Arc<RwLock<Option<StoredToken>>>,
    storage_path: PathBuf,
}

impl StoredTokenProvider {
    /// Default token location: `<config dir>/flashforge/token.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("flashforge").join("token.json"))
    }

    pub async fn new(storage_path: PathBuf) -> Result<Self> {
        info!("TokenStore: Initializing with path: {:?}", storage_path);

        // Try to load an existing token
        let token = if storage_path.exists() {
            match fs::read_to_string(&storage_path).await {
                Ok(content) => match serde_json::from_str::<StoredToken>(&content) {
                    Ok(token) => {
                        debug!("TokenStore: Loaded token");
                        Some(token)
                    }
                    Err(e) => {
                        error!("TokenStore: Failed to parse stored token: {}", e);
                        None
                    }
                },
                Err(e) => {
                    error!("TokenStore: Failed to read token file: {}", e);
                    None
                }
            }
        } else {
            debug!("TokenStore: No token file at {:?}", storage_path);
            None
        };

        Ok(Self {
            token: Arc::new(RwLock::new(token)),
            storage_path,
        })
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Currently loaded token, expired or not
    pub async fn current(&self) -> Option<StoredToken> {
        self.token.read().await.clone()
    }

    /// Replace the stored token and persist it
    pub async fn store(&self, token: StoredToken) -> Result<()> {
        self.save_token(&token).await?;
        *self.token.write().await = Some(token);
        Ok(())
    }

    /// Forget the token and remove the file
    pub async fn clear(&self) -> Result<()> {
        *self.token.write().await = None;
        if self.storage_path.exists() {
            fs::remove_file(&self.storage_path)
                .await
                .with_context(|| format!("removing {}", self.storage_path.display()))?;
        }
        Ok(())
    }

    /// Save token to disk with owner-only permissions
    async fn save_token(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.storage_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(token)?;
        fs::write(&self.storage_path, json)
            .await
            .with_context(|| format!("writing {}", self.storage_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(&self.storage_path).await?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o600);
            fs::set_permissions(&self.storage_path, permissions).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl TokenProvider for StoredTokenProvider {
    async fn session_token(&self) -> Result<Option<String>> {
        let guard = self.token.read().await;
        match &*guard {
            None => Ok(None),
            Some(token) if token.is_expired() => {
                warn!("TokenStore: Stored token expired, sign in again");
                Ok(None)
            }
            Some(token) => Ok(Some(token.access_token.clone())),
        }
    }
}
