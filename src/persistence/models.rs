//! Database Models
//!
//! Persistent data structures for the local user, preferences, order
//! tracking, and audit entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Local user record. This server runs in "local single-user" mode: one row,
/// created lazily on first access.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-user preference record, one-to-one with users.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PreferenceRecord {
    pub user_id: String,
    pub trading_enabled: bool,
    pub default_account_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Local view of a single brokerage order, keyed by (account_id, order_id).
/// `status` is stored as raw text because the upstream brokerage is
/// authoritative and may report values outside the documented set.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderTrackingRecord {
    pub id: i64,
    pub user_id: String,
    pub account_id: String,
    pub order_id: String,
    pub status: String,
    pub payload: Option<String>, // JSON snapshot of the last request/response
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Locally cached account activity event, keyed by the upstream event id.
/// Events are immutable facts: once cached, a row is never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityEventRecord {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub event_type: String,
    pub description: Option<String>,
    pub event_time: DateTime<Utc>,
    pub payload: Option<String>, // JSON snapshot of the upstream event
    pub created_at: DateTime<Utc>,
}

/// Insert input for the activity cache
#[derive(Debug, Clone)]
pub struct NewActivityEvent {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub event_type: String,
    pub description: Option<String>,
    pub event_time: DateTime<Utc>,
    pub payload: Option<String>,
}

/// Append-only audit entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogRecord {
    pub id: i64,
    pub user_id: String,
    pub event_type: String,
    pub payload: Option<String>, // JSON string
    pub created_at: DateTime<Utc>,
}

/// Upsert input for order tracking
#[derive(Debug, Clone)]
pub struct UpsertOrderTracking {
    pub user_id: String,
    pub account_id: String,
    pub order_id: String,
    pub status: String,
    pub payload: Option<String>,
}

/// Partial preference update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdatePreferences {
    pub trading_enabled: Option<bool>,
    pub default_account_id: Option<Option<String>>,
}

/// Create audit log input
#[derive(Debug, Clone)]
pub struct CreateAuditLog {
    pub user_id: String,
    pub event_type: String,
    pub payload: Option<serde_json::Value>,
}
