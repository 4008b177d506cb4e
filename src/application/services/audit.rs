//! Best-effort Audit Recorder
//!
//! Every gated action attempt is recorded, independent of outcome. The write
//! is a side channel: a failure is logged and swallowed, never propagated,
//! so auditing can never block or fail the primary trading operation.

use serde_json::Value;
use tracing::warn;

use crate::persistence::models::CreateAuditLog;
use crate::persistence::repository::AuditLogRepository;
use crate::persistence::DbPool;

/// Append an audit entry, swallowing any failure.
pub async fn record(pool: &DbPool, user_id: &str, event_type: &str, payload: Option<Value>) {
    let result = AuditLogRepository::new(pool.clone())
        .create(CreateAuditLog {
            user_id: user_id.to_string(),
            event_type: event_type.to_string(),
            payload,
        })
        .await;

    if let Err(e) = result {
        warn!("Audit write failed for {}: {}", event_type, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::repository::UserRepository;
    use crate::persistence::init_database;

    #[tokio::test]
    async fn test_record_persists_entry() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user = UserRepository::new(pool.clone())
            .get_or_create_local()
            .await
            .unwrap();

        record(
            &pool,
            &user.id,
            "ORDER_PLACE_REQUEST",
            Some(serde_json::json!({"accountId": "acct-1"})),
        )
        .await;

        let rows = AuditLogRepository::new(pool)
            .get_recent(&user.id, 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "ORDER_PLACE_REQUEST");
    }

    #[tokio::test]
    async fn test_record_swallows_failures() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        // Drop the table so the insert fails; record must not panic or
        // propagate anything.
        sqlx::query("DROP TABLE audit_log")
            .execute(&pool)
            .await
            .unwrap();

        record(&pool, "nobody", "ORDER_PLACE_REQUEST", None).await;
    }
}
