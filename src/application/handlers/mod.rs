//! HTTP Handlers
//!
//! Route handlers mirroring the dashboard API surface: gated order mutation
//! routes, preference and tracking reads, and pass-through market data
//! routes that relay upstream status and body verbatim.

pub mod activity;
pub mod market;
pub mod orders;
pub mod prefs;
pub mod tracking;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;

use crate::config::Config;
use crate::domain::gateway::{GatewayResponse, TradingGateway};
use crate::infrastructure::credentials::TokenSupplier;
use crate::persistence::DbPool;

/// Shared state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub pool: DbPool,
    pub gateway: Arc<dyn TradingGateway>,
    pub tokens: Arc<TokenSupplier>,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(market::health))
        .route("/api/public/auth", post(market::auth_check))
        .route("/api/public/accounts", get(market::accounts))
        .route("/api/public/portfolio", get(market::portfolio))
        .route("/api/public/history", get(market::history))
        .route(
            "/api/public/options/expirations",
            post(market::option_expirations),
        )
        .route("/api/public/options/greeks", get(market::option_greeks))
        .route("/api/public/orders/place", post(orders::place_order))
        .route("/api/public/orders/cancel", delete(orders::cancel_order))
        .route("/api/public/orders/status", get(orders::order_status))
        .route(
            "/api/public/orders/preflight/single",
            post(orders::preflight_single),
        )
        .route(
            "/api/public/orders/preflight/multi",
            post(orders::preflight_multi),
        )
        .route(
            "/api/prefs",
            get(prefs::get_preferences).post(prefs::update_preferences),
        )
        .route("/api/activity", get(activity::list_activity))
        .route("/api/order-tracking", get(tracking::list_order_tracking))
        .route("/api/audit", get(tracking::list_audit))
        .with_state(state)
}

/// Relay an upstream reply verbatim: same status code, same body.
pub(crate) fn passthrough(response: GatewayResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        response.body,
    )
        .into_response()
}

/// Clamp a caller-supplied row limit into [1, 200].
pub(crate) fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, 200)
}
