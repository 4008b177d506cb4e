//! Database Repository
//!
//! Data access layer for the local user, preferences, order tracking, and
//! audit logs.

use super::models::*;
use super::{DatabaseError, DbPool};
use chrono::Utc;
use tracing::{debug, error};

/// Fixed identity for the local single-user deployment. Replace with real
/// auth when this moves beyond personal use.
pub const LOCAL_USER_EMAIL: &str = "local-user@dashboard";

/// SQL list of terminal statuses, used to guard against regressing an order
/// that has already reached its final state.
const TERMINAL_STATUSES_SQL: &str = "('FILLED', 'CANCELLED', 'REJECTED', 'EXPIRED')";

/// User repository
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fetch the local user, creating it (with default preferences,
    /// trading disabled) on first access.
    pub async fn get_or_create_local(&self) -> Result<UserRecord, DatabaseError> {
        let existing = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = ?1")
            .bind(LOCAL_USER_EMAIL)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to look up local user: {}", e);
                DatabaseError::QueryError(format!("Failed to look up local user: {}", e))
            })?;

        if let Some(user) = existing {
            return Ok(user);
        }

        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await.map_err(|e| {
            DatabaseError::QueryError(format!("Failed to begin transaction: {}", e))
        })?;

        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, email, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(LOCAL_USER_EMAIL)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to create local user: {}", e);
            DatabaseError::QueryError(format!("Failed to create local user: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, trading_enabled, created_at, updated_at)
            VALUES (?1, 0, ?2, ?2)
            "#,
        )
        .bind(&id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to create default preferences: {}", e);
            DatabaseError::QueryError(format!("Failed to create default preferences: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            DatabaseError::QueryError(format!("Failed to commit user creation: {}", e))
        })?;

        debug!("Created local user {}", user.id);
        Ok(user)
    }
}

/// Preference repository
pub struct PreferenceRepository {
    pool: DbPool,
}

impl PreferenceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Read preferences for a user. Must be queried fresh on every gated
    /// request: the trading toggle has to take effect immediately.
    pub async fn get(&self, user_id: &str) -> Result<Option<PreferenceRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, PreferenceRecord>(
            "SELECT * FROM user_preferences WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get preferences for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to get preferences: {}", e))
        })?;

        Ok(record)
    }

    /// Partial update with last-write-wins semantics. Creates the row if it
    /// does not exist yet.
    pub async fn upsert(
        &self,
        user_id: &str,
        update: UpdatePreferences,
    ) -> Result<PreferenceRecord, DatabaseError> {
        let now = Utc::now();
        let existing = self.get(user_id).await?;

        let trading_enabled = update
            .trading_enabled
            .unwrap_or_else(|| existing.as_ref().is_some_and(|p| p.trading_enabled));
        let default_account_id = match update.default_account_id {
            Some(value) => value,
            None => existing.as_ref().and_then(|p| p.default_account_id.clone()),
        };

        let record = sqlx::query_as::<_, PreferenceRecord>(
            r#"
            INSERT INTO user_preferences (user_id, trading_enabled, default_account_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                trading_enabled = excluded.trading_enabled,
                default_account_id = excluded.default_account_id,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(trading_enabled)
        .bind(&default_account_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to upsert preferences for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to upsert preferences: {}", e))
        })?;

        debug!(
            "Updated preferences for {}: trading_enabled={}",
            user_id, record.trading_enabled
        );
        Ok(record)
    }
}

/// Order tracking repository
pub struct OrderTrackingRepository {
    pool: DbPool,
}

impl OrderTrackingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Idempotent upsert on (account_id, order_id). A retry with the same
    /// caller-supplied order id updates status/payload/updated_at instead of
    /// creating a duplicate row; the unique constraint serializes races.
    pub async fn upsert(
        &self,
        input: UpsertOrderTracking,
    ) -> Result<OrderTrackingRecord, DatabaseError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, OrderTrackingRecord>(
            r#"
            INSERT INTO order_tracking (user_id, account_id, order_id, status, payload, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(account_id, order_id) DO UPDATE SET
                status = excluded.status,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(&input.user_id)
        .bind(&input.account_id)
        .bind(&input.order_id)
        .bind(&input.status)
        .bind(&input.payload)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to upsert order tracking for {}/{}: {}",
                input.account_id, input.order_id, e
            );
            DatabaseError::QueryError(format!("Failed to upsert order tracking: {}", e))
        })?;

        debug!(
            "Upserted order tracking {}/{} -> {}",
            record.account_id, record.order_id, record.status
        );
        Ok(record)
    }

    /// Overwrite the status of a tracked order, unless it already reached a
    /// terminal state. Returns the number of rows updated (0 when no row
    /// matched or the stored status is terminal).
    pub async fn update_status(
        &self,
        user_id: &str,
        account_id: &str,
        order_id: &str,
        status: &str,
    ) -> Result<u64, DatabaseError> {
        let now = Utc::now();
        let query = format!(
            r#"
            UPDATE order_tracking
            SET status = ?1, updated_at = ?2
            WHERE user_id = ?3 AND account_id = ?4 AND order_id = ?5
              AND status NOT IN {TERMINAL_STATUSES_SQL}
            "#
        );
        let rows_affected = sqlx::query(&query)
            .bind(status)
            .bind(now)
            .bind(user_id)
            .bind(account_id)
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(
                    "Failed to update order status for {}/{}: {}",
                    account_id, order_id, e
                );
                DatabaseError::QueryError(format!("Failed to update order status: {}", e))
            })?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Look up a tracked order by its identity pair.
    pub async fn find(
        &self,
        account_id: &str,
        order_id: &str,
    ) -> Result<Option<OrderTrackingRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, OrderTrackingRecord>(
            "SELECT * FROM order_tracking WHERE account_id = ?1 AND order_id = ?2",
        )
        .bind(account_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to get order tracking for {}/{}: {}",
                account_id, order_id, e
            );
            DatabaseError::QueryError(format!("Failed to get order tracking: {}", e))
        })?;

        Ok(record)
    }

    /// List a user's tracked orders, most recently updated first.
    pub async fn list_by_user(
        &self,
        user_id: &str,
        account_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<OrderTrackingRecord>, DatabaseError> {
        let records = match account_id {
            Some(account_id) => {
                sqlx::query_as::<_, OrderTrackingRecord>(
                    r#"
                    SELECT * FROM order_tracking
                    WHERE user_id = ?1 AND account_id = ?2
                    ORDER BY updated_at DESC
                    LIMIT ?3
                    "#,
                )
                .bind(user_id)
                .bind(account_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, OrderTrackingRecord>(
                    r#"
                    SELECT * FROM order_tracking
                    WHERE user_id = ?1
                    ORDER BY updated_at DESC
                    LIMIT ?2
                    "#,
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| {
            error!("Failed to list order tracking for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to list order tracking: {}", e))
        })?;

        Ok(records)
    }
}

/// Audit log repository
pub struct AuditLogRepository {
    pool: DbPool,
}

impl AuditLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append an audit entry. Callers that must not fail on audit errors
    /// wrap this in the best-effort recorder.
    pub async fn create(&self, log: CreateAuditLog) -> Result<AuditLogRecord, DatabaseError> {
        let now = Utc::now();
        let payload_json = log.payload.map(|p| p.to_string());

        let record = sqlx::query_as::<_, AuditLogRecord>(
            r#"
            INSERT INTO audit_log (user_id, event_type, payload, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING *
            "#,
        )
        .bind(&log.user_id)
        .bind(&log.event_type)
        .bind(&payload_json)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create audit log: {}", e);
            DatabaseError::QueryError(format!("Failed to create audit log: {}", e))
        })?;

        debug!("Created audit log: {}", record.event_type);
        Ok(record)
    }

    /// Get recent audit entries for a user, newest first.
    pub async fn get_recent(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<AuditLogRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, AuditLogRecord>(
            "SELECT * FROM audit_log WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get recent audit logs: {}", e);
            DatabaseError::QueryError(format!("Failed to get audit logs: {}", e))
        })?;

        Ok(records)
    }
}

/// Activity cache repository
pub struct ActivityRepository {
    pool: DbPool,
}

impl ActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Cache one upstream event, keyed by its upstream id. Events are
    /// immutable facts, so an id already cached is left untouched. Returns
    /// whether a new row was written.
    pub async fn insert_if_absent(&self, event: NewActivityEvent) -> Result<bool, DatabaseError> {
        let now = Utc::now();
        let rows_affected = sqlx::query(
            r#"
            INSERT OR IGNORE INTO activity_events
                (id, user_id, account_id, event_type, description, event_time, payload, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&event.id)
        .bind(&event.user_id)
        .bind(&event.account_id)
        .bind(&event.event_type)
        .bind(&event.description)
        .bind(event.event_time)
        .bind(&event.payload)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to cache activity event {}: {}", event.id, e);
            DatabaseError::QueryError(format!("Failed to cache activity event: {}", e))
        })?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    /// Cached events for an account, newest first.
    pub async fn list(
        &self,
        user_id: &str,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<ActivityEventRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, ActivityEventRecord>(
            r#"
            SELECT * FROM activity_events
            WHERE user_id = ?1 AND account_id = ?2
            ORDER BY event_time DESC
            LIMIT ?3
            "#,
        )
        .bind(user_id)
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list activity events for {}: {}", account_id, e);
            DatabaseError::QueryError(format!("Failed to list activity events: {}", e))
        })?;

        Ok(records)
    }
}
