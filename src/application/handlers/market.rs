//! Health, credential check, and market data pass-through routes. These
//! relay whatever the upstream brokerage answers, status code included.

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{passthrough, AppState};
use crate::domain::errors::ApiError;

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "mock": state.config.mock,
    }))
}

/// POST /api/public/auth
///
/// Verifies that credentials work by minting (or reusing) an access token.
/// The token itself is never returned to the caller.
pub async fn auth_check(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    if state.config.mock {
        return Ok(Json(json!({ "ok": true, "mode": "MOCK" })));
    }

    let token = state.tokens.access_token().await?;
    Ok(Json(json!({
        "ok": true,
        "mode": "LIVE",
        "tokenPresent": !token.is_empty(),
    })))
}

/// GET /api/public/accounts
pub async fn accounts(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let response = state.gateway.list_accounts().await?;
    Ok(passthrough(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountQuery {
    pub account_id: String,
}

/// GET /api/public/portfolio?accountId=..
pub async fn portfolio(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AccountQuery>,
) -> Result<Response, ApiError> {
    if params.account_id.is_empty() {
        return Err(ApiError::BadRequest("accountId is required".to_string()));
    }
    let response = state.gateway.portfolio(&params.account_id).await?;
    Ok(passthrough(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub account_id: String,
    pub start: String,
    pub end: String,
    pub page_size: Option<String>,
    pub next_token: Option<String>,
}

/// GET /api/public/history?accountId=..&start=..&end=..
pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    if params.account_id.is_empty() {
        return Err(ApiError::BadRequest("accountId is required".to_string()));
    }
    if params.start.is_empty() || params.end.is_empty() {
        return Err(ApiError::BadRequest(
            "start and end are required".to_string(),
        ));
    }

    let response = state
        .gateway
        .account_history(
            &params.account_id,
            &params.start,
            &params.end,
            params.page_size.as_deref().unwrap_or("20"),
            params.next_token.as_deref(),
        )
        .await?;
    Ok(passthrough(response))
}

/// POST /api/public/options/expirations
pub async fn option_expirations(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let account_id = body
        .get("accountId")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest("accountId is required".to_string()))?
        .to_string();

    let response = state.gateway.option_expirations(&account_id, &body).await?;
    Ok(passthrough(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GreeksQuery {
    pub account_id: String,
    pub osi_symbols: String,
}

/// GET /api/public/options/greeks?accountId=..&osiSymbols=..
pub async fn option_greeks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GreeksQuery>,
) -> Result<Response, ApiError> {
    if params.account_id.is_empty() {
        return Err(ApiError::BadRequest("accountId is required".to_string()));
    }
    if params.osi_symbols.is_empty() {
        return Err(ApiError::BadRequest("osiSymbols is required".to_string()));
    }

    let response = state
        .gateway
        .option_greeks(&params.account_id, &params.osi_symbols)
        .await?;
    Ok(passthrough(response))
}
