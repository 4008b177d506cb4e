//! Activity Cache
//!
//! Persists upstream account activity locally so the dashboard keeps its
//! history across upstream hiccups and pagination windows. Events are keyed
//! by the upstream event id and cached insert-only: an event already seen is
//! never rewritten, a refresh only adds what is new.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::persistence::models::NewActivityEvent;
use crate::persistence::repository::ActivityRepository;
use crate::persistence::{DatabaseError, DbPool};

/// Event type stored when upstream omits one.
const UNKNOWN_EVENT_TYPE: &str = "UNKNOWN";

/// Merge one upstream activity reply (`{"events": [...]}`) into the cache.
/// Events without an id or with an unparseable timestamp cannot be keyed and
/// are skipped. Returns the number of newly cached events.
pub async fn ingest(
    pool: &DbPool,
    user_id: &str,
    account_id: &str,
    body: &Value,
) -> Result<u64, DatabaseError> {
    let events = match body.get("events").and_then(Value::as_array) {
        Some(events) => events,
        None => return Ok(0),
    };

    let repo = ActivityRepository::new(pool.clone());
    let mut inserted = 0;
    for event in events {
        let id = match event.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id,
            _ => {
                debug!("Skipping activity event without an id for {}", account_id);
                continue;
            }
        };
        let event_time = match event
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        {
            Some(t) => t.with_timezone(&Utc),
            None => {
                debug!("Skipping activity event {} with bad timestamp", id);
                continue;
            }
        };

        let new = repo
            .insert_if_absent(NewActivityEvent {
                id: id.to_string(),
                user_id: user_id.to_string(),
                account_id: account_id.to_string(),
                event_type: event
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or(UNKNOWN_EVENT_TYPE)
                    .to_string(),
                description: event
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                event_time,
                payload: Some(event.to_string()),
            })
            .await?;
        if new {
            inserted += 1;
        }
    }

    if inserted > 0 {
        debug!("Cached {} new activity events for {}", inserted, account_id);
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::persistence::init_database;
    use crate::persistence::repository::UserRepository;

    async fn setup() -> (DbPool, String) {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user = UserRepository::new(pool.clone())
            .get_or_create_local()
            .await
            .unwrap();
        (pool, user.id)
    }

    fn upstream_reply() -> Value {
        json!({
            "events": [
                {
                    "id": "evt-1",
                    "type": "FILL",
                    "timestamp": "2026-08-29T14:00:00Z",
                    "description": "Filled BUY 5 VUG @ 295.00"
                },
                {
                    "id": "evt-2",
                    "type": "DIVIDEND",
                    "timestamp": "2026-08-28T10:00:00Z",
                    "description": "Dividend VOO"
                }
            ],
            "nextToken": "tok"
        })
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent_across_refreshes() {
        let (pool, user_id) = setup().await;

        let first = ingest(&pool, &user_id, "acct-1", &upstream_reply())
            .await
            .unwrap();
        assert_eq!(first, 2);

        // Same reply again: nothing new to cache.
        let second = ingest(&pool, &user_id, "acct-1", &upstream_reply())
            .await
            .unwrap();
        assert_eq!(second, 0);

        let rows = ActivityRepository::new(pool)
            .list(&user_id, "acct-1", 100)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "evt-1");
    }

    #[tokio::test]
    async fn test_unkeyable_events_are_skipped() {
        let (pool, user_id) = setup().await;

        let reply = json!({
            "events": [
                { "type": "FILL", "timestamp": "2026-08-29T14:00:00Z" },
                { "id": "evt-bad-time", "type": "FILL", "timestamp": "yesterday" },
                { "id": "evt-ok", "type": "FILL", "timestamp": "2026-08-29T15:00:00Z" }
            ]
        });
        let inserted = ingest(&pool, &user_id, "acct-1", &reply).await.unwrap();
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn test_reply_without_events_is_a_noop() {
        let (pool, user_id) = setup().await;

        let inserted = ingest(&pool, &user_id, "acct-1", &json!({"error": "oops"}))
            .await
            .unwrap();
        assert_eq!(inserted, 0);
    }
}
