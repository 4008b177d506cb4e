use std::net::SocketAddr;
use zeroize::Zeroizing;

/// Default upstream brokerage API base URL.
const DEFAULT_PUBLIC_API_BASE_URL: &str = "https://api.public.com";

/// Server configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    /// Serve canned data instead of calling the upstream brokerage.
    pub mock: bool,
    /// Upstream brokerage API base URL.
    pub public_api_base_url: String,
    /// Pre-shared secret used to mint short-lived access tokens.
    pub public_secret_token: Zeroizing<String>,
    /// Validity requested for minted access tokens, in minutes.
    pub access_token_ttl_minutes: u64,
    /// Operator-controlled master switch for any order-mutating request.
    pub enable_trading: bool,
    /// Optional unlock code required in the `x-trading-unlock` header.
    /// Empty string disables the check.
    pub trading_unlock_code: String,
    /// SQLite database URL.
    pub database_url: String,
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Request timeout applied to every upstream call, in seconds.
    pub upstream_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            // Safe default: outside release builds, run mock mode unless
            // explicitly disabled.
            mock: cfg!(debug_assertions),
            public_api_base_url: DEFAULT_PUBLIC_API_BASE_URL.to_string(),
            public_secret_token: Zeroizing::new(String::new()),
            access_token_ttl_minutes: 15,
            enable_trading: false,
            trading_unlock_code: String::new(),
            database_url: "sqlite://data/tradedesk.db".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            upstream_timeout_seconds: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Config {
        let mut config = Config::default();

        if let Ok(mock) = std::env::var("MOCK_PUBLIC_API") {
            config.mock = mock.to_lowercase() == "true" || mock == "1";
        }

        if let Ok(base_url) = std::env::var("PUBLIC_API_BASE_URL") {
            match url::Url::parse(&base_url) {
                Ok(_) => config.public_api_base_url = base_url.trim_end_matches('/').to_string(),
                Err(e) => {
                    tracing::warn!(
                        "Invalid PUBLIC_API_BASE_URL '{}': {}, using default: {}",
                        base_url,
                        e,
                        config.public_api_base_url
                    );
                }
            }
        }

        if let Ok(secret) = std::env::var("PUBLIC_SECRET_TOKEN") {
            config.public_secret_token = Zeroizing::new(secret);
        }

        if let Ok(ttl) = std::env::var("PUBLIC_ACCESS_TOKEN_TTL_MINUTES") {
            match ttl.parse::<u64>() {
                Ok(value) if (1..=60).contains(&value) => {
                    config.access_token_ttl_minutes = value;
                }
                Ok(value) => {
                    tracing::warn!(
                        "Invalid PUBLIC_ACCESS_TOKEN_TTL_MINUTES value: {} (must be between 1 and 60), using default: {}",
                        value, config.access_token_ttl_minutes
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse PUBLIC_ACCESS_TOKEN_TTL_MINUTES '{}': {}, using default: {}",
                        ttl,
                        e,
                        config.access_token_ttl_minutes
                    );
                }
            }
        }

        // Strict equality: anything other than "true" leaves trading off.
        config.enable_trading = std::env::var("ENABLE_TRADING")
            .map(|v| v == "true")
            .unwrap_or(false);

        if let Ok(code) = std::env::var("TRADING_UNLOCK_CODE") {
            config.trading_unlock_code = code;
        }

        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            config.database_url = database_url;
        }

        if let Ok(addr) = std::env::var("BIND_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(value) => config.bind_addr = value,
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse BIND_ADDR '{}': {}, using default: {}",
                        addr,
                        e,
                        config.bind_addr
                    );
                }
            }
        }

        if let Ok(timeout) = std::env::var("UPSTREAM_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse::<u64>() {
                if (1..=120).contains(&value) {
                    config.upstream_timeout_seconds = value;
                }
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.public_api_base_url, "https://api.public.com");
        assert_eq!(config.access_token_ttl_minutes, 15);
        assert!(!config.enable_trading);
        assert!(config.trading_unlock_code.is_empty());
        assert_eq!(config.upstream_timeout_seconds, 30);
    }
}
