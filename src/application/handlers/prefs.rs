//! Preference routes for the local single-user deployment.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::AppState;
use crate::application::services::audit;
use crate::domain::errors::ApiError;
use crate::persistence::models::UpdatePreferences;
use crate::persistence::repository::{PreferenceRepository, UserRepository};

/// GET /api/prefs
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let user = UserRepository::new(state.pool.clone())
        .get_or_create_local()
        .await?;
    let prefs = PreferenceRepository::new(state.pool.clone())
        .get(&user.id)
        .await?;

    Ok(Json(json!({ "preferences": prefs })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceUpdate {
    pub trading_enabled: Option<bool>,
    /// An empty string clears the stored default account.
    pub default_account_id: Option<String>,
}

/// POST /api/prefs
///
/// Partial update: absent fields are left untouched. Takes effect on the
/// very next gated request since the gate reads preferences fresh.
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PreferenceUpdate>,
) -> Result<Json<Value>, ApiError> {
    let user = UserRepository::new(state.pool.clone())
        .get_or_create_local()
        .await?;

    let update = UpdatePreferences {
        trading_enabled: body.trading_enabled,
        default_account_id: body
            .default_account_id
            .map(|v| if v.is_empty() { None } else { Some(v) }),
    };

    let prefs = PreferenceRepository::new(state.pool.clone())
        .upsert(&user.id, update)
        .await?;

    audit::record(
        &state.pool,
        &user.id,
        "PREFS_UPDATE",
        Some(json!({
            "tradingEnabled": prefs.trading_enabled,
            "defaultAccountId": prefs.default_account_id,
        })),
    )
    .await;

    Ok(Json(json!({ "preferences": prefs })))
}
