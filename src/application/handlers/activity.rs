//! Activity route: refresh the local activity cache from upstream, then
//! serve the persisted view. The cached copy is what makes the feed survive
//! upstream flakiness; a failed refresh degrades to stale data instead of an
//! empty feed.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use super::{clamp_limit, AppState};
use crate::application::services::activity_cache;
use crate::domain::errors::ApiError;
use crate::persistence::repository::{ActivityRepository, UserRepository};

/// Refresh window when the caller does not give one.
const DEFAULT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQuery {
    pub account_id: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub page_size: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/activity?accountId=..
pub async fn list_activity(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ActivityQuery>,
) -> Result<Json<Value>, ApiError> {
    if params.account_id.is_empty() {
        return Err(ApiError::BadRequest("accountId is required".to_string()));
    }

    let user = UserRepository::new(state.pool.clone())
        .get_or_create_local()
        .await?;

    let now = Utc::now();
    let start = params
        .start
        .unwrap_or_else(|| (now - Duration::days(DEFAULT_WINDOW_DAYS)).to_rfc3339());
    let end = params.end.unwrap_or_else(|| now.to_rfc3339());

    let response = state
        .gateway
        .account_history(
            &params.account_id,
            &start,
            &end,
            params.page_size.as_deref().unwrap_or("50"),
            None,
        )
        .await?;

    if response.is_success() {
        activity_cache::ingest(&state.pool, &user.id, &params.account_id, &response.json())
            .await?;
    } else {
        // Serve the cached view rather than failing the feed.
        warn!(
            "Activity refresh for {} failed upstream with HTTP {}, serving cached events",
            params.account_id, response.status
        );
    }

    let events = ActivityRepository::new(state.pool.clone())
        .list(&user.id, &params.account_id, clamp_limit(params.limit, 100))
        .await?;

    Ok(Json(json!({ "events": events })))
}
