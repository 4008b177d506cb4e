//! Mock Gateway
//!
//! Offline implementation of the trading gateway serving canned data, so the
//! dashboard works end to end with no upstream credentials. Order mutations
//! echo the shapes the live brokerage would produce: placements come back
//! `SUBMITTED`, cancels `CANCEL_REQUESTED`, and status queries settle on
//! `WORKING` for orders this gateway has actually accepted. Unknown order
//! ids report "not indexed", like the live upstream would for an order that
//! does not exist yet.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::domain::errors::GatewayError;
use crate::domain::gateway::{GatewayResponse, OrderLookup, TradingGateway};

#[derive(Default)]
pub struct MockGateway {
    placed: Mutex<HashSet<(String, String)>>,
}

#[async_trait]
impl TradingGateway for MockGateway {
    async fn list_accounts(&self) -> Result<GatewayResponse, GatewayError> {
        Ok(GatewayResponse::ok(json!({
            "accounts": [
                { "accountId": "mock-brokerage-001", "accountType": "BROKERAGE", "optionsLevel": "LEVEL_1" }
            ]
        })))
    }

    async fn portfolio(&self, _account_id: &str) -> Result<GatewayResponse, GatewayError> {
        Ok(GatewayResponse::ok(json!({
            "equityValue": { "amount": "123456.78", "currency": "USD" },
            "buyingPower": { "amount": "10234.56", "currency": "USD" },
            "positions": [
                {
                    "symbol": "VUG",
                    "type": "EQUITY",
                    "quantity": "120",
                    "lastPrice": { "amount": "300.12", "currency": "USD" },
                    "marketValue": { "amount": "36014.40", "currency": "USD" },
                    "costBasis": { "amount": "32000.00", "currency": "USD" },
                    "percentOfPortfolio": "29.2",
                    "instrumentGain": { "amount": "4014.40", "currency": "USD" },
                    "positionDailyGain": { "amount": "120.12", "currency": "USD" }
                },
                {
                    "symbol": "VOO",
                    "type": "EQUITY",
                    "quantity": "50",
                    "lastPrice": { "amount": "450.33", "currency": "USD" },
                    "marketValue": { "amount": "22516.50", "currency": "USD" },
                    "costBasis": { "amount": "21000.00", "currency": "USD" },
                    "percentOfPortfolio": "18.2",
                    "instrumentGain": { "amount": "1516.50", "currency": "USD" },
                    "positionDailyGain": { "amount": "-30.50", "currency": "USD" }
                },
                {
                    "symbol": "SMH",
                    "type": "EQUITY",
                    "quantity": "40",
                    "lastPrice": { "amount": "200.10", "currency": "USD" },
                    "marketValue": { "amount": "8004.00", "currency": "USD" },
                    "costBasis": { "amount": "7600.00", "currency": "USD" },
                    "percentOfPortfolio": "6.5",
                    "instrumentGain": { "amount": "404.00", "currency": "USD" },
                    "positionDailyGain": { "amount": "44.00", "currency": "USD" }
                }
            ],
            "openOrders": [
                {
                    "orderId": "mock-order-001",
                    "symbol": "VUG",
                    "side": "BUY",
                    "orderType": "LIMIT",
                    "quantity": "5",
                    "limitPrice": { "amount": "295.00", "currency": "USD" },
                    "status": "NEW",
                    "createdAt": (Utc::now() - Duration::minutes(8)).to_rfc3339()
                },
                {
                    "orderId": "mock-order-002",
                    "symbol": "SMH",
                    "side": "SELL",
                    "orderType": "MARKET",
                    "quantity": "2",
                    "status": "PENDING",
                    "createdAt": (Utc::now() - Duration::minutes(22)).to_rfc3339()
                }
            ]
        })))
    }

    async fn account_history(
        &self,
        _account_id: &str,
        _start: &str,
        _end: &str,
        _page_size: &str,
        _next_token: Option<&str>,
    ) -> Result<GatewayResponse, GatewayError> {
        let now = Utc::now();
        let events: Vec<Value> = (0..20)
            .map(|i| {
                let timestamp = (now - Duration::hours(6 * i)).to_rfc3339();
                let (event_type, description) = match i % 3 {
                    0 => ("FILL", "Filled BUY 5 VUG @ 295.00"),
                    1 => ("DIVIDEND", "Dividend VOO"),
                    _ => ("DEPOSIT", "Deposit"),
                };
                json!({
                    "id": format!("mock-evt-{}", i),
                    "timestamp": timestamp,
                    "type": event_type,
                    "description": description
                })
            })
            .collect();

        Ok(GatewayResponse::ok(json!({
            "events": events,
            "nextToken": "mock-next-token"
        })))
    }

    async fn option_expirations(
        &self,
        _account_id: &str,
        _body: &Value,
    ) -> Result<GatewayResponse, GatewayError> {
        let today = Utc::now();
        let dates: Vec<String> = [7, 14, 28, 56]
            .iter()
            .map(|d| (today + Duration::days(*d)).format("%Y-%m-%d").to_string())
            .collect();

        Ok(GatewayResponse::ok(json!({ "expirationDates": dates })))
    }

    async fn option_greeks(
        &self,
        _account_id: &str,
        _osi_symbols: &str,
    ) -> Result<GatewayResponse, GatewayError> {
        Ok(GatewayResponse::ok(json!({ "greeks": [] })))
    }

    async fn preflight_single(
        &self,
        _account_id: &str,
        _body: &Value,
    ) -> Result<GatewayResponse, GatewayError> {
        Ok(GatewayResponse::ok(json!({
            "ok": true,
            "warnings": [],
            "estimatedCost": "0.00"
        })))
    }

    async fn preflight_multi(
        &self,
        _account_id: &str,
        _body: &Value,
    ) -> Result<GatewayResponse, GatewayError> {
        Ok(GatewayResponse::ok(json!({
            "ok": true,
            "warnings": [],
            "estimatedCost": "0.00"
        })))
    }

    async fn place_order(
        &self,
        account_id: &str,
        body: &Value,
    ) -> Result<GatewayResponse, GatewayError> {
        let order_id = body.get("orderId").and_then(Value::as_str).unwrap_or("");
        if !order_id.is_empty() {
            self.placed
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert((account_id.to_string(), order_id.to_string()));
        }
        Ok(GatewayResponse::ok(json!({
            "orderId": order_id,
            "status": "SUBMITTED"
        })))
    }

    async fn cancel_order(
        &self,
        _account_id: &str,
        order_id: &str,
    ) -> Result<GatewayResponse, GatewayError> {
        Ok(GatewayResponse::ok(json!({
            "orderId": order_id,
            "status": "CANCEL_REQUESTED"
        })))
    }

    async fn order_status(
        &self,
        account_id: &str,
        order_id: &str,
    ) -> Result<OrderLookup, GatewayError> {
        let known = self
            .placed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(account_id.to_string(), order_id.to_string()));
        if !known {
            return Ok(OrderLookup::NotYetIndexed);
        }

        Ok(OrderLookup::Found(json!({
            "orderId": order_id,
            "status": "WORKING"
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_of_unknown_order_is_not_indexed() {
        let gateway = MockGateway::default();
        let lookup = gateway.order_status("acct-1", "never-placed").await.unwrap();
        assert!(matches!(lookup, OrderLookup::NotYetIndexed));
    }

    #[tokio::test]
    async fn test_placed_order_settles_on_working() {
        let gateway = MockGateway::default();
        gateway
            .place_order("acct-1", &json!({ "orderId": "ord-1" }))
            .await
            .unwrap();

        let lookup = gateway.order_status("acct-1", "ord-1").await.unwrap();
        match lookup {
            OrderLookup::Found(body) => assert_eq!(body["status"], "WORKING"),
            other => panic!("unexpected lookup: {:?}", other),
        }
    }
}
