use crate::app::ports::TokenManagerPort;
use crate::domain::parties::Certificate;
use async_trait::async_trait;

/// Hands out a token obtained elsewhere, e.g. passed on the command line.
#[derive(Debug, Clone)]
pub struct StaticTokenManager {
    token: String,
}

impl StaticTokenManager {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenManagerPort for StaticTokenManager {
    async fn get_token(&self, _certificate: &Certificate) -> Result<String, String> {
        if self.token.trim().is_empty() {
            return Err("no token configured".to_string());
        }
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_the_configured_token() {
        let certificate = Certificate::new("11111111-1", "Firmante");
        let manager = StaticTokenManager::new("ABC123");
        assert_eq!(manager.get_token(&certificate).await.unwrap(), "ABC123");
        assert!(StaticTokenManager::new(" ").get_token(&certificate).await.is_err());
    }
}
