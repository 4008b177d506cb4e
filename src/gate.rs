//! Trading Safety Gate
//!
//! Authorization state machine guarding every order-mutating request. Three
//! checks, applied in strict order with short-circuiting:
//!
//! 1. operator-controlled server flag (`ENABLE_TRADING`)
//! 2. the user's persisted `trading_enabled` preference, read fresh on every
//!    request so a settings change takes effect immediately
//! 3. the optional unlock code, compared exactly against the
//!    `x-trading-unlock` request header
//!
//! Decisions are never cached across requests.

use axum::http::HeaderMap;

use crate::config::Config;
use crate::persistence::repository::{PreferenceRepository, UserRepository};
use crate::persistence::{DatabaseError, DbPool};

/// Request header carrying the plaintext unlock code.
pub const TRADING_UNLOCK_HEADER: &str = "x-trading-unlock";

/// Gate outcome. A rejection carries the user-facing reason; an allowance
/// carries the resolved user identity for downstream writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allowed { user_id: String },
    Rejected { reason: String },
}

/// Evaluate the gate for one request. Only infrastructure failures (database
/// errors) surface as `Err`; policy rejections are `Ok(Rejected)`.
pub async fn authorize(
    pool: &DbPool,
    config: &Config,
    headers: &HeaderMap,
) -> Result<GateDecision, DatabaseError> {
    if !config.enable_trading {
        return Ok(GateDecision::Rejected {
            reason: "Trading is disabled on the server. Set ENABLE_TRADING=true to enable."
                .to_string(),
        });
    }

    let user = UserRepository::new(pool.clone()).get_or_create_local().await?;
    let prefs = PreferenceRepository::new(pool.clone()).get(&user.id).await?;
    if !prefs.is_some_and(|p| p.trading_enabled) {
        return Ok(GateDecision::Rejected {
            reason: "Trading is disabled in Settings. Enable trading to proceed.".to_string(),
        });
    }

    if !config.trading_unlock_code.is_empty() {
        let provided = headers
            .get(TRADING_UNLOCK_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if provided != config.trading_unlock_code {
            return Ok(GateDecision::Rejected {
                reason: "Trading unlock code is missing or invalid.".to_string(),
            });
        }
    }

    Ok(GateDecision::Allowed { user_id: user.id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::models::UpdatePreferences;
    use crate::persistence::init_database;

    async fn setup(enable_trading: bool, unlock_code: &str) -> (DbPool, Config) {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let config = Config {
            enable_trading,
            trading_unlock_code: unlock_code.to_string(),
            ..Config::default()
        };
        (pool, config)
    }

    async fn enable_user_trading(pool: &DbPool) -> String {
        let user = UserRepository::new(pool.clone())
            .get_or_create_local()
            .await
            .unwrap();
        PreferenceRepository::new(pool.clone())
            .upsert(
                &user.id,
                UpdatePreferences {
                    trading_enabled: Some(true),
                    default_account_id: None,
                },
            )
            .await
            .unwrap();
        user.id
    }

    #[tokio::test]
    async fn test_server_flag_rejects_everything() {
        let (pool, config) = setup(false, "").await;
        // Even with user preference enabled, the server flag wins.
        enable_user_trading(&pool).await;

        let decision = authorize(&pool, &config, &HeaderMap::new()).await.unwrap();
        assert!(matches!(decision, GateDecision::Rejected { reason } if reason.contains("server")));
    }

    #[tokio::test]
    async fn test_user_preference_rejects_by_default() {
        let (pool, config) = setup(true, "").await;

        let decision = authorize(&pool, &config, &HeaderMap::new()).await.unwrap();
        assert!(
            matches!(decision, GateDecision::Rejected { reason } if reason.contains("Settings"))
        );
    }

    #[tokio::test]
    async fn test_unlock_code_required_when_configured() {
        let (pool, config) = setup(true, "open-sesame").await;
        enable_user_trading(&pool).await;

        // Missing header
        let decision = authorize(&pool, &config, &HeaderMap::new()).await.unwrap();
        assert!(
            matches!(decision, GateDecision::Rejected { reason } if reason.contains("unlock code"))
        );

        // Wrong value
        let mut headers = HeaderMap::new();
        headers.insert(TRADING_UNLOCK_HEADER, "wrong".parse().unwrap());
        let decision = authorize(&pool, &config, &headers).await.unwrap();
        assert!(matches!(decision, GateDecision::Rejected { .. }));

        // Exact match
        let mut headers = HeaderMap::new();
        headers.insert(TRADING_UNLOCK_HEADER, "open-sesame".parse().unwrap());
        let decision = authorize(&pool, &config, &headers).await.unwrap();
        assert!(matches!(decision, GateDecision::Allowed { .. }));
    }

    #[tokio::test]
    async fn test_allows_and_reflects_preference_change_immediately() {
        let (pool, config) = setup(true, "").await;
        let user_id = enable_user_trading(&pool).await;

        let decision = authorize(&pool, &config, &HeaderMap::new()).await.unwrap();
        assert_eq!(
            decision,
            GateDecision::Allowed {
                user_id: user_id.clone()
            }
        );

        // Toggle off; the very next evaluation must reject.
        PreferenceRepository::new(pool.clone())
            .upsert(
                &user_id,
                UpdatePreferences {
                    trading_enabled: Some(false),
                    default_account_id: None,
                },
            )
            .await
            .unwrap();

        let decision = authorize(&pool, &config, &HeaderMap::new()).await.unwrap();
        assert!(matches!(decision, GateDecision::Rejected { .. }));
    }
}
