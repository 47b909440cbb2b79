//! Authentication for Flashforge
//!
//! The session only needs an active session token; how it was obtained is up
//! to the provider.
//!
//! - Static tokens (flags, environment)
//! - Token file storage with expiry

pub mod token_store;

use async_trait::async_trait;

pub use token_store::{StoredToken, StoredTokenProvider};

/// Source of the session token for the signed-in identity
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The current token, or None when nobody is signed in
    async fn session_token(&self) -> anyhow::Result<Option<String>>;
}

/// Fixed token known up front
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// Provider with no signed-in identity
    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn session_token(&self) -> anyhow::Result<Option<String>> {
        Ok(self
            .0
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(
            StaticToken::new("abc").session_token().await.unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(StaticToken::new("  ").session_token().await.unwrap(), None);
        assert_eq!(StaticToken::anonymous().session_token().await.unwrap(), None);
    }
}
