//! Order Lifecycle Reconciler
//!
//! Bridges the gap between "we believe an order was submitted" and "upstream
//! has indexed it and can report its true status". Upstream indexing is
//! eventually consistent: a status query can 404 for a short window after
//! placement, and that window must never be read as an error or a
//! cancellation.
//!
//! Invariants enforced here:
//! - the tracking row is written BEFORE the upstream placement call, so a
//!   timed-out request can be retried with the same caller-supplied order id
//! - a 404 status query leaves the stored row untouched
//! - an upstream error reply (401, 5xx) is relayed verbatim and never merged
//!   into the store; only a 2xx body carries order state
//! - a terminal status (FILLED/CANCELLED/REJECTED/EXPIRED) is never regressed
//!   by a later non-terminal observation, even though upstream is nominally
//!   authoritative

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::domain::errors::GatewayError;
use crate::domain::gateway::{GatewayResponse, OrderLookup, TradingGateway};
use crate::domain::order_status::{is_terminal_status, OrderStatus};
use crate::persistence::models::UpsertOrderTracking;
use crate::persistence::repository::OrderTrackingRepository;
use crate::persistence::{DatabaseError, DbPool};

/// Status reported by upstream when the order body carries none.
const UNKNOWN_STATUS: &str = "UNKNOWN";

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Outcome of a status query.
#[derive(Debug, Clone)]
pub enum StatusOutcome {
    /// Upstream has not indexed the order yet; the local record was left
    /// untouched.
    PendingIndex,
    /// Upstream reported a real order body. `status` is the stored value
    /// after the merge (it keeps a terminal status that upstream would have
    /// regressed).
    Reported { status: String, body: Value },
    /// Upstream answered the query with an error status. The reply is
    /// relayed verbatim; the local record was left untouched.
    Failed(GatewayResponse),
}

pub struct OrderReconciler {
    pool: DbPool,
    gateway: Arc<dyn TradingGateway>,
}

impl OrderReconciler {
    pub fn new(pool: DbPool, gateway: Arc<dyn TradingGateway>) -> Self {
        Self { pool, gateway }
    }

    fn tracking(&self) -> OrderTrackingRepository {
        OrderTrackingRepository::new(self.pool.clone())
    }

    /// Record the placement attempt locally, then forward it upstream.
    ///
    /// The upsert happens first: if the upstream call times out, the row
    /// already exists and the caller retries with the same order id, which
    /// lands on the same row. Tracking failures surface — losing the write
    /// would defeat the idempotency guarantee.
    pub async fn place(
        &self,
        user_id: &str,
        account_id: &str,
        order_id: &str,
        body: &Value,
    ) -> Result<GatewayResponse, ReconcileError> {
        self.tracking()
            .upsert(UpsertOrderTracking {
                user_id: user_id.to_string(),
                account_id: account_id.to_string(),
                order_id: order_id.to_string(),
                status: OrderStatus::Submitted.to_string(),
                payload: Some(body.to_string()),
            })
            .await?;

        let response = self.gateway.place_order(account_id, body).await?;
        Ok(response)
    }

    /// Optimistically mark the order cancel-requested, then forward the
    /// cancellation. Does not wait for upstream resolution: a later status
    /// poll reconciles to whatever actually happened, which may be a fill
    /// that beat the cancellation race.
    pub async fn request_cancel(
        &self,
        user_id: &str,
        account_id: &str,
        order_id: &str,
    ) -> Result<GatewayResponse, ReconcileError> {
        self.tracking()
            .update_status(
                user_id,
                account_id,
                order_id,
                OrderStatus::CancelRequested.as_str(),
            )
            .await?;

        let response = self.gateway.cancel_order(account_id, order_id).await?;
        Ok(response)
    }

    /// Query upstream for the order's current status and merge the answer
    /// into the tracking store.
    pub async fn check_status(
        &self,
        user_id: &str,
        account_id: &str,
        order_id: &str,
    ) -> Result<StatusOutcome, ReconcileError> {
        match self.gateway.order_status(account_id, order_id).await? {
            OrderLookup::NotYetIndexed => {
                debug!(
                    "Order {}/{} not indexed upstream yet, reporting {}",
                    account_id,
                    order_id,
                    OrderStatus::PendingIndex
                );
                Ok(StatusOutcome::PendingIndex)
            }
            OrderLookup::Failed(response) => {
                debug!(
                    "Status query for {}/{} failed upstream with HTTP {}, keeping stored state",
                    account_id, order_id, response.status
                );
                Ok(StatusOutcome::Failed(response))
            }
            OrderLookup::Found(body) => {
                let incoming = body
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or(UNKNOWN_STATUS)
                    .to_string();

                let existing = self.tracking().find(account_id, order_id).await?;
                let stored_terminal = existing
                    .as_ref()
                    .is_some_and(|r| is_terminal_status(&r.status));
                if stored_terminal && !is_terminal_status(&incoming) {
                    let stored = existing.map(|r| r.status).unwrap_or(incoming);
                    debug!(
                        "Order {}/{} already terminal ({}), ignoring upstream status",
                        account_id, order_id, stored
                    );
                    return Ok(StatusOutcome::Reported {
                        status: stored,
                        body,
                    });
                }

                let record = self
                    .tracking()
                    .upsert(UpsertOrderTracking {
                        user_id: user_id.to_string(),
                        account_id: account_id.to_string(),
                        order_id: order_id.to_string(),
                        status: incoming,
                        payload: Some(body.to_string()),
                    })
                    .await?;

                Ok(StatusOutcome::Reported {
                    status: record.status,
                    body,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::persistence::init_database;
    use crate::persistence::repository::UserRepository;

    /// Scripted gateway: order status answers are popped from a queue;
    /// placement and cancellation outcomes are configurable.
    struct ScriptedGateway {
        status_answers: Mutex<Vec<Result<OrderLookup, GatewayError>>>,
        fail_place: bool,
    }

    impl ScriptedGateway {
        fn with_status_answers(answers: Vec<Result<OrderLookup, GatewayError>>) -> Arc<Self> {
            Arc::new(Self {
                status_answers: Mutex::new(answers),
                fail_place: false,
            })
        }

        fn failing_place() -> Arc<Self> {
            Arc::new(Self {
                status_answers: Mutex::new(Vec::new()),
                fail_place: true,
            })
        }
    }

    #[async_trait]
    impl TradingGateway for ScriptedGateway {
        async fn list_accounts(&self) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::ok(json!({})))
        }

        async fn portfolio(&self, _account_id: &str) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::ok(json!({})))
        }

        async fn account_history(
            &self,
            _account_id: &str,
            _start: &str,
            _end: &str,
            _page_size: &str,
            _next_token: Option<&str>,
        ) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::ok(json!({})))
        }

        async fn option_expirations(
            &self,
            _account_id: &str,
            _body: &Value,
        ) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::ok(json!({})))
        }

        async fn option_greeks(
            &self,
            _account_id: &str,
            _osi_symbols: &str,
        ) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::ok(json!({})))
        }

        async fn preflight_single(
            &self,
            _account_id: &str,
            _body: &Value,
        ) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::ok(json!({})))
        }

        async fn preflight_multi(
            &self,
            _account_id: &str,
            _body: &Value,
        ) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::ok(json!({})))
        }

        async fn place_order(
            &self,
            _account_id: &str,
            body: &Value,
        ) -> Result<GatewayResponse, GatewayError> {
            if self.fail_place {
                return Err(GatewayError::Network("connection timed out".to_string()));
            }
            Ok(GatewayResponse::ok(json!({
                "orderId": body.get("orderId").and_then(Value::as_str).unwrap_or(""),
                "status": "SUBMITTED"
            })))
        }

        async fn cancel_order(
            &self,
            _account_id: &str,
            order_id: &str,
        ) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::ok(
                json!({ "orderId": order_id, "status": "CANCEL_REQUESTED" }),
            ))
        }

        async fn order_status(
            &self,
            _account_id: &str,
            _order_id: &str,
        ) -> Result<OrderLookup, GatewayError> {
            self.status_answers
                .lock()
                .unwrap()
                .remove(0)
        }
    }

    async fn setup(gateway: Arc<dyn TradingGateway>) -> (DbPool, OrderReconciler, String) {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user = UserRepository::new(pool.clone())
            .get_or_create_local()
            .await
            .unwrap();
        let reconciler = OrderReconciler::new(pool.clone(), gateway);
        (pool, reconciler, user.id)
    }

    #[tokio::test]
    async fn test_place_writes_tracking_before_upstream() {
        let gateway = ScriptedGateway::failing_place();
        let (pool, reconciler, user_id) = setup(gateway).await;

        let result = reconciler
            .place(&user_id, "acct-1", "ord-1", &json!({"orderSide": "BUY"}))
            .await;
        assert!(matches!(result, Err(ReconcileError::Gateway(_))));

        // The row exists despite the upstream failure: a retry with the same
        // order id is the recovery mechanism.
        let record = OrderTrackingRepository::new(pool)
            .find("acct-1", "ord-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, "SUBMITTED");
    }

    #[tokio::test]
    async fn test_not_yet_indexed_leaves_row_untouched() {
        let gateway = ScriptedGateway::with_status_answers(vec![Ok(OrderLookup::NotYetIndexed)]);
        let (pool, reconciler, user_id) = setup(gateway.clone()).await;

        let repo = OrderTrackingRepository::new(pool.clone());
        repo.upsert(UpsertOrderTracking {
            user_id: user_id.clone(),
            account_id: "acct-1".to_string(),
            order_id: "ord-1".to_string(),
            status: "WORKING".to_string(),
            payload: None,
        })
        .await
        .unwrap();

        let outcome = reconciler
            .check_status(&user_id, "acct-1", "ord-1")
            .await
            .unwrap();
        assert!(matches!(outcome, StatusOutcome::PendingIndex));

        // Previously observed status is not downgraded.
        let record = repo.find("acct-1", "ord-1").await.unwrap().unwrap();
        assert_eq!(record.status, "WORKING");
    }

    #[tokio::test]
    async fn test_not_yet_indexed_creates_no_row() {
        let gateway = ScriptedGateway::with_status_answers(vec![Ok(OrderLookup::NotYetIndexed)]);
        let (pool, reconciler, user_id) = setup(gateway).await;

        let outcome = reconciler
            .check_status(&user_id, "acct-1", "ghost")
            .await
            .unwrap();
        assert!(matches!(outcome, StatusOutcome::PendingIndex));

        let record = OrderTrackingRepository::new(pool)
            .find("acct-1", "ghost")
            .await
            .unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_reply_keeps_stored_state() {
        let gateway = ScriptedGateway::with_status_answers(vec![Ok(OrderLookup::Failed(
            GatewayResponse {
                status: 503,
                body: "Service Unavailable".to_string(),
            },
        ))]);
        let (pool, reconciler, user_id) = setup(gateway).await;

        let repo = OrderTrackingRepository::new(pool.clone());
        repo.upsert(UpsertOrderTracking {
            user_id: user_id.clone(),
            account_id: "acct-1".to_string(),
            order_id: "ord-1".to_string(),
            status: "WORKING".to_string(),
            payload: None,
        })
        .await
        .unwrap();

        let outcome = reconciler
            .check_status(&user_id, "acct-1", "ord-1")
            .await
            .unwrap();
        match outcome {
            StatusOutcome::Failed(response) => assert_eq!(response.status, 503),
            other => panic!("unexpected outcome: {:?}", other),
        }

        // A failed query is not an observation; the row keeps its state.
        let record = repo.find("acct-1", "ord-1").await.unwrap().unwrap();
        assert_eq!(record.status, "WORKING");
    }

    #[tokio::test]
    async fn test_found_status_merges_into_store() {
        let gateway = ScriptedGateway::with_status_answers(vec![Ok(OrderLookup::Found(
            json!({"orderId": "ord-1", "status": "FILLED"}),
        ))]);
        let (pool, reconciler, user_id) = setup(gateway).await;

        let outcome = reconciler
            .check_status(&user_id, "acct-1", "ord-1")
            .await
            .unwrap();
        match outcome {
            StatusOutcome::Reported { status, .. } => assert_eq!(status, "FILLED"),
            other => panic!("unexpected outcome: {:?}", other),
        }

        let record = OrderTrackingRepository::new(pool)
            .find("acct-1", "ord-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, "FILLED");
    }

    #[tokio::test]
    async fn test_terminal_status_never_regresses() {
        let gateway = ScriptedGateway::with_status_answers(vec![
            Ok(OrderLookup::Found(json!({"status": "FILLED"}))),
            Ok(OrderLookup::Found(json!({"status": "WORKING"}))),
        ]);
        let (pool, reconciler, user_id) = setup(gateway).await;

        reconciler
            .check_status(&user_id, "acct-1", "ord-1")
            .await
            .unwrap();

        // A late, stale non-terminal observation must not rewrite the row.
        let outcome = reconciler
            .check_status(&user_id, "acct-1", "ord-1")
            .await
            .unwrap();
        match outcome {
            StatusOutcome::Reported { status, .. } => assert_eq!(status, "FILLED"),
            other => panic!("unexpected outcome: {:?}", other),
        }

        let record = OrderTrackingRepository::new(pool)
            .find("acct-1", "ord-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, "FILLED");
    }

    #[tokio::test]
    async fn test_missing_status_field_stored_as_unknown() {
        let gateway = ScriptedGateway::with_status_answers(vec![Ok(OrderLookup::Found(
            json!({"orderId": "ord-1"}),
        ))]);
        let (pool, reconciler, user_id) = setup(gateway).await;

        reconciler
            .check_status(&user_id, "acct-1", "ord-1")
            .await
            .unwrap();

        let record = OrderTrackingRepository::new(pool)
            .find("acct-1", "ord-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, "UNKNOWN");
    }

    #[tokio::test]
    async fn test_cancel_marks_locally_before_forwarding() {
        let gateway = ScriptedGateway::with_status_answers(vec![]);
        let (pool, reconciler, user_id) = setup(gateway).await;

        let repo = OrderTrackingRepository::new(pool.clone());
        repo.upsert(UpsertOrderTracking {
            user_id: user_id.clone(),
            account_id: "acct-1".to_string(),
            order_id: "ord-1".to_string(),
            status: "WORKING".to_string(),
            payload: None,
        })
        .await
        .unwrap();

        let response = reconciler
            .request_cancel(&user_id, "acct-1", "ord-1")
            .await
            .unwrap();
        assert!(response.is_success());

        let record = repo.find("acct-1", "ord-1").await.unwrap().unwrap();
        assert_eq!(record.status, "CANCEL_REQUESTED");
    }
}
