use async_trait::async_trait;

/// A bearer credential together with its unix expiry time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: i64,
}

/// Yields a short-lived credential for every outbound request.
///
/// The client calls this on each request and does not cache the result;
/// providers are expected to cache and refresh internally.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(
        &self,
    ) -> Result<AccessToken, Box<dyn std::error::Error + Send + Sync>>;
}
