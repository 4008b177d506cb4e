//! Order routes: placement, cancellation, status polling, and preflight
//! estimates. Every route here passes through the trading gate; status
//! polling spends upstream credentials and writes the tracking store, so it
//! is locked down with the rest.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::{passthrough, AppState};
use crate::application::services::audit;
use crate::application::services::order_reconciler::{
    OrderReconciler, ReconcileError, StatusOutcome,
};
use crate::domain::errors::ApiError;
use crate::domain::order_status::{next_poll_interval, OrderStatus};
use crate::gate::{authorize, GateDecision};

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Database(e) => ApiError::Database(e),
            ReconcileError::Gateway(e) => ApiError::Gateway(e),
        }
    }
}

fn require_str<'a>(body: &'a Value, key: &str, message: &str) -> Result<&'a str, ApiError> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

async fn enforce_gate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<String, ApiError> {
    match authorize(&state.pool, &state.config, headers).await? {
        GateDecision::Allowed { user_id } => Ok(user_id),
        GateDecision::Rejected { reason } => Err(ApiError::Forbidden(reason)),
    }
}

/// POST /api/public/orders/place
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let user_id = enforce_gate(&state, &headers).await?;

    let account_id = require_str(&body, "accountId", "accountId is required")?.to_string();
    let order_id = require_str(
        &body,
        "orderId",
        "orderId is required (UUID for idempotency)",
    )?
    .to_string();

    audit::record(
        &state.pool,
        &user_id,
        "ORDER_PLACE_REQUEST",
        Some(json!({
            "accountId": account_id,
            "orderId": order_id,
            "instrument": body.get("instrument").cloned().unwrap_or(Value::Null),
            "orderType": body.get("orderType").cloned().unwrap_or(Value::Null),
            "orderSide": body.get("orderSide").cloned().unwrap_or(Value::Null),
        })),
    )
    .await;

    info!("Placing order {} on account {}", order_id, account_id);
    let reconciler = OrderReconciler::new(state.pool.clone(), state.gateway.clone());
    let response = reconciler
        .place(&user_id, &account_id, &order_id, &body)
        .await?;
    Ok(passthrough(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRef {
    pub account_id: String,
    pub order_id: String,
}

/// DELETE /api/public/orders/cancel?accountId=..&orderId=..
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<OrderRef>,
) -> Result<Response, ApiError> {
    let user_id = enforce_gate(&state, &headers).await?;

    if params.account_id.is_empty() {
        return Err(ApiError::BadRequest("accountId is required".to_string()));
    }
    if params.order_id.is_empty() {
        return Err(ApiError::BadRequest("orderId is required".to_string()));
    }

    audit::record(
        &state.pool,
        &user_id,
        "ORDER_CANCEL_REQUEST",
        Some(json!({
            "accountId": params.account_id,
            "orderId": params.order_id,
        })),
    )
    .await;

    info!(
        "Requesting cancel for order {} on account {}",
        params.order_id, params.account_id
    );
    let reconciler = OrderReconciler::new(state.pool.clone(), state.gateway.clone());
    let response = reconciler
        .request_cancel(&user_id, &params.account_id, &params.order_id)
        .await?;
    Ok(passthrough(response))
}

/// GET /api/public/orders/status?accountId=..&orderId=..
///
/// A 404 upstream is reported as `PENDING_INDEX` with a 200, never as an
/// error, because it only means the order has not been indexed yet. Other
/// upstream error replies are relayed verbatim.
pub async fn order_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<OrderRef>,
) -> Result<Response, ApiError> {
    let user_id = enforce_gate(&state, &headers).await?;

    if params.account_id.is_empty() {
        return Err(ApiError::BadRequest("accountId is required".to_string()));
    }
    if params.order_id.is_empty() {
        return Err(ApiError::BadRequest("orderId is required".to_string()));
    }

    let reconciler = OrderReconciler::new(state.pool.clone(), state.gateway.clone());
    let outcome = reconciler
        .check_status(&user_id, &params.account_id, &params.order_id)
        .await?;

    // The response carries a polling hint so clients back off correctly:
    // null once the order is terminal, a short interval while it is not.
    match outcome {
        StatusOutcome::PendingIndex => {
            let poll = next_poll_interval(OrderStatus::PendingIndex.as_str());
            Ok(Json(json!({
                "orderId": params.order_id,
                "status": OrderStatus::PendingIndex.as_str(),
                "pollAfterMs": poll.map(|d| d.as_millis() as u64),
            }))
            .into_response())
        }
        StatusOutcome::Reported { status, mut body } => {
            if let Some(obj) = body.as_object_mut() {
                let poll = next_poll_interval(&status).map(|d| d.as_millis() as u64);
                obj.insert("pollAfterMs".to_string(), json!(poll));
                // The merge may have kept a terminal status upstream tried
                // to regress; the body must agree with the stored answer.
                obj.insert("status".to_string(), json!(status));
            }
            Ok(Json(body).into_response())
        }
        StatusOutcome::Failed(response) => Ok(passthrough(response)),
    }
}

/// POST /api/public/orders/preflight/single
pub async fn preflight_single(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let user_id = enforce_gate(&state, &headers).await?;
    let account_id = require_str(&body, "accountId", "accountId is required")?.to_string();

    audit::record(
        &state.pool,
        &user_id,
        "PREFLIGHT_SINGLE",
        Some(json!({
            "accountId": account_id,
            "instrument": body.get("instrument").cloned().unwrap_or(Value::Null),
            "orderType": body.get("orderType").cloned().unwrap_or(Value::Null),
            "orderSide": body.get("orderSide").cloned().unwrap_or(Value::Null),
        })),
    )
    .await;

    let response = state.gateway.preflight_single(&account_id, &body).await?;
    Ok(passthrough(response))
}

/// POST /api/public/orders/preflight/multi
pub async fn preflight_multi(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let user_id = enforce_gate(&state, &headers).await?;
    let account_id = require_str(&body, "accountId", "accountId is required")?.to_string();

    audit::record(
        &state.pool,
        &user_id,
        "PREFLIGHT_MULTI",
        Some(json!({
            "accountId": account_id,
            "legs": body.get("legs").cloned().unwrap_or(Value::Null),
        })),
    )
    .await;

    let response = state.gateway.preflight_multi(&account_id, &body).await?;
    Ok(passthrough(response))
}
