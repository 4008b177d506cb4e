//! Credential/Token Supplier
//!
//! Mints and caches the short-lived bearer token every upstream call depends
//! on. The cache lives on the supplier (dependency-injected, no process-wide
//! statics) and a token is treated as expired once it has less than the
//! safety margin of validity left; the refresh then happens synchronously
//! before the dependent call proceeds. Concurrent callers may race a refresh;
//! the redundant mint is tolerated and the last write wins.

use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::domain::errors::GatewayError;

/// Sentinel token returned in mock mode, with no network call.
pub const MOCK_ACCESS_TOKEN: &str = "MOCK_ACCESS_TOKEN";

/// A token within this margin of expiry is treated as already expired.
const EXPIRY_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct MintResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Supplier of upstream access tokens.
pub struct TokenSupplier {
    client: reqwest::Client,
    base_url: String,
    secret: Zeroizing<String>,
    ttl_minutes: u64,
    mock: bool,
    cache: RwLock<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenSupplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSupplier")
            .field("base_url", &self.base_url)
            .field("ttl_minutes", &self.ttl_minutes)
            .field("mock", &self.mock)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

impl TokenSupplier {
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.public_api_base_url.clone(),
            secret: config.public_secret_token.clone(),
            ttl_minutes: config.access_token_ttl_minutes,
            mock: config.mock,
            cache: RwLock::new(None),
        })
    }

    /// Return a bearer token with at least the safety margin of validity
    /// remaining, minting a fresh one if needed.
    pub async fn access_token(&self) -> Result<String, GatewayError> {
        if self.mock {
            return Ok(MOCK_ACCESS_TOKEN.to_string());
        }

        let now = Instant::now();
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.expires_at > now + EXPIRY_MARGIN {
                return Ok(cached.token.clone());
            }
        }

        self.mint(now).await
    }

    async fn mint(&self, now: Instant) -> Result<String, GatewayError> {
        if self.secret.is_empty() {
            return Err(GatewayError::Credential(
                "PUBLIC_SECRET_TOKEN is not set. Set it in the environment (server-side only)."
                    .to_string(),
            ));
        }

        debug!("Minting a new upstream access token");
        let url = format!(
            "{}/userapigateway/trading/personal-access-token",
            self.base_url
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.secret.as_str()))
            .json(&serde_json::json!({
                "validityDurationInMinutes": self.ttl_minutes
            }))
            .send()
            .await
            .map_err(|e| GatewayError::Network(format!("Token mint request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // Nothing is cached for a failed attempt.
            let detail = if body.is_empty() {
                format!("Token mint failed: HTTP {}", status)
            } else {
                body
            };
            return Err(GatewayError::Credential(detail));
        }

        let minted: MintResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Credential(format!("Malformed mint response: {}", e)))?;

        let expires_at = now + Duration::from_secs(self.ttl_minutes * 60);
        let token = minted.access_token;
        *self.cache.write().await = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });
        info!("Minted upstream access token (ttl {} minutes)", self.ttl_minutes);

        Ok(token)
    }

    /// Seed the cache directly. Test hook for expiry-margin behavior.
    #[cfg(test)]
    pub(crate) async fn seed_cache(&self, token: &str, expires_in: Duration) {
        *self.cache.write().await = Some(CachedToken {
            token: token.to_string(),
            expires_at: Instant::now() + expires_in,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_config() -> Config {
        Config {
            mock: false,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_mock_mode_returns_sentinel_without_network() {
        let config = Config {
            mock: true,
            ..Config::default()
        };
        let supplier = TokenSupplier::new(&config).unwrap();
        assert_eq!(supplier.access_token().await.unwrap(), MOCK_ACCESS_TOKEN);
    }

    #[tokio::test]
    async fn test_cached_token_returned_while_outside_margin() {
        let supplier = TokenSupplier::new(&live_config()).unwrap();
        supplier.seed_cache("cached-token", Duration::from_secs(60)).await;

        assert_eq!(supplier.access_token().await.unwrap(), "cached-token");
    }

    #[tokio::test]
    async fn test_token_within_margin_triggers_refresh() {
        // No secret configured: the refresh attempt must fail with a
        // credential error instead of serving the nearly-expired token.
        let supplier = TokenSupplier::new(&live_config()).unwrap();
        supplier.seed_cache("stale-token", Duration::from_secs(3)).await;

        let err = supplier.access_token().await.unwrap_err();
        assert!(matches!(err, GatewayError::Credential(_)));
    }

    #[tokio::test]
    async fn test_missing_secret_fails_and_caches_nothing() {
        let supplier = TokenSupplier::new(&live_config()).unwrap();

        let err = supplier.access_token().await.unwrap_err();
        assert!(matches!(err, GatewayError::Credential(_)));
        assert!(supplier.cache.read().await.is_none());
    }
}
