//! Read-only views over the local order tracking store and the audit log.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{clamp_limit, AppState};
use crate::domain::errors::ApiError;
use crate::persistence::repository::{
    AuditLogRepository, OrderTrackingRepository, UserRepository,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingQuery {
    pub account_id: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/order-tracking
pub async fn list_order_tracking(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrackingQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = UserRepository::new(state.pool.clone())
        .get_or_create_local()
        .await?;

    let rows = OrderTrackingRepository::new(state.pool.clone())
        .list_by_user(
            &user.id,
            params.account_id.as_deref(),
            clamp_limit(params.limit, 100),
        )
        .await?;

    Ok(Json(json!({ "rows": rows })))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

/// GET /api/audit
pub async fn list_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = UserRepository::new(state.pool.clone())
        .get_or_create_local()
        .await?;

    let rows = AuditLogRepository::new(state.pool.clone())
        .get_recent(&user.id, clamp_limit(params.limit, 50))
        .await?;

    Ok(Json(json!({ "rows": rows })))
}
