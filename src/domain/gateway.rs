//! Trading Gateway Trait
//!
//! Common interface over the upstream brokerage API. The live implementation
//! talks HTTP; the mock implementation serves canned data for offline use.
//! Keeping the seam here lets the reconciler and the route handlers be tested
//! against scripted gateways.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::GatewayError;

/// Raw upstream reply: status and body carried verbatim so route handlers
/// can pass non-2xx responses straight through to the caller.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

impl GatewayResponse {
    pub fn ok(body: Value) -> GatewayResponse {
        GatewayResponse {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as JSON, with an empty object fallback for unparseable bodies.
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

/// Result of an order status query against the upstream brokerage.
///
/// Upstream indexing is eventually consistent: a 404 shortly after placement
/// means "not visible yet", never "does not exist" and never "cancelled".
/// Modelling that value explicitly is what keeps the reconciler from
/// downgrading known order state. Any other non-2xx reply is a failure to
/// answer, not an answer: it is carried verbatim and never merged into the
/// tracking store.
#[derive(Debug, Clone)]
pub enum OrderLookup {
    /// Upstream reported a real order body (2xx).
    Found(Value),
    /// Upstream returned 404; the order has not been indexed yet.
    NotYetIndexed,
    /// Upstream answered with an error status (401, 5xx, ...). The reply is
    /// relayed as-is and says nothing about the order's state.
    Failed(GatewayResponse),
}

/// Upstream brokerage operations consumed by the server.
#[async_trait]
pub trait TradingGateway: Send + Sync {
    async fn list_accounts(&self) -> Result<GatewayResponse, GatewayError>;

    async fn portfolio(&self, account_id: &str) -> Result<GatewayResponse, GatewayError>;

    async fn account_history(
        &self,
        account_id: &str,
        start: &str,
        end: &str,
        page_size: &str,
        next_token: Option<&str>,
    ) -> Result<GatewayResponse, GatewayError>;

    async fn option_expirations(
        &self,
        account_id: &str,
        body: &Value,
    ) -> Result<GatewayResponse, GatewayError>;

    async fn option_greeks(
        &self,
        account_id: &str,
        osi_symbols: &str,
    ) -> Result<GatewayResponse, GatewayError>;

    async fn preflight_single(
        &self,
        account_id: &str,
        body: &Value,
    ) -> Result<GatewayResponse, GatewayError>;

    async fn preflight_multi(
        &self,
        account_id: &str,
        body: &Value,
    ) -> Result<GatewayResponse, GatewayError>;

    async fn place_order(
        &self,
        account_id: &str,
        body: &Value,
    ) -> Result<GatewayResponse, GatewayError>;

    async fn cancel_order(
        &self,
        account_id: &str,
        order_id: &str,
    ) -> Result<GatewayResponse, GatewayError>;

    async fn order_status(
        &self,
        account_id: &str,
        order_id: &str,
    ) -> Result<OrderLookup, GatewayError>;
}
