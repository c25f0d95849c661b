use async_trait::async_trait;
use thiserror::Error;

use gdmirror_core::{AccessToken, TokenProvider};

#[derive(Debug, Error)]
pub enum TokenProviderError {
    #[error("access token is empty")]
    EmptyToken,
}

/// Serves one pre-minted bearer token unchanged.
///
/// The engine trusts its provider to refresh credentials, so a static token
/// is only good for its own lifetime; swap in a refreshing provider for
/// long-running mirrors.
pub struct StaticToken {
    token: String,
    expires_at: i64,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: 0,
        }
    }

    pub fn with_expiry(mut self, expires_at: i64) -> Self {
        self.expires_at = expires_at;
        self
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(
        &self,
    ) -> Result<AccessToken, Box<dyn std::error::Error + Send + Sync>> {
        if self.token.is_empty() {
            return Err(Box::new(TokenProviderError::EmptyToken));
        }

        Ok(AccessToken {
            secret: self.token.clone(),
            expires_at: self.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_the_configured_token() {
        let provider = StaticToken::new("token-1").with_expiry(1_700_000_000);

        let token = provider.access_token().await.unwrap();

        assert_eq!(token.secret, "token-1");
        assert_eq!(token.expires_at, 1_700_000_000);
    }

    #[tokio::test]
    async fn rejects_an_empty_token() {
        let provider = StaticToken::new("");

        let err = provider.access_token().await.unwrap_err();

        assert!(err.downcast_ref::<TokenProviderError>().is_some());
    }
}
