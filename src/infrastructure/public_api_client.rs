//! Public Brokerage API Client
//!
//! Live implementation of the trading gateway: a thin HTTP pass-through to
//! the upstream brokerage, authenticated with a freshly supplied bearer
//! token per call. Upstream status and body travel back verbatim so route
//! handlers can relay non-2xx replies unchanged.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::domain::errors::GatewayError;
use crate::domain::gateway::{GatewayResponse, OrderLookup, TradingGateway};
use crate::infrastructure::credentials::TokenSupplier;

pub struct PublicApiClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenSupplier>,
}

impl PublicApiClient {
    pub fn new(config: &Config, tokens: Arc<TokenSupplier>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.public_api_base_url.clone(),
            tokens,
        })
    }

    async fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, GatewayError> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}{}", self.base_url, path);
        Ok(self
            .client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", token)))
    }

    async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<GatewayResponse, GatewayError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Network(format!("Upstream request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::MalformedResponse(format!("Failed to read body: {}", e)))?;

        Ok(GatewayResponse { status, body })
    }
}

#[async_trait]
impl TradingGateway for PublicApiClient {
    async fn list_accounts(&self) -> Result<GatewayResponse, GatewayError> {
        let builder = self
            .request(Method::GET, "/userapigateway/trading/account")
            .await?;
        self.execute(builder).await
    }

    async fn portfolio(&self, account_id: &str) -> Result<GatewayResponse, GatewayError> {
        let path = format!("/userapigateway/trading/{}/portfolio/v2", account_id);
        let builder = self.request(Method::GET, &path).await?;
        self.execute(builder).await
    }

    async fn account_history(
        &self,
        account_id: &str,
        start: &str,
        end: &str,
        page_size: &str,
        next_token: Option<&str>,
    ) -> Result<GatewayResponse, GatewayError> {
        let path = format!("/userapigateway/trading/{}/history", account_id);
        let mut query = vec![
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        if let Some(token) = next_token {
            query.push(("nextToken", token.to_string()));
        }
        let builder = self.request(Method::GET, &path).await?.query(&query);
        self.execute(builder).await
    }

    async fn option_expirations(
        &self,
        account_id: &str,
        body: &Value,
    ) -> Result<GatewayResponse, GatewayError> {
        let path = format!(
            "/userapigateway/marketdata/{}/option-expirations",
            account_id
        );
        let builder = self.request(Method::POST, &path).await?.json(body);
        self.execute(builder).await
    }

    async fn option_greeks(
        &self,
        account_id: &str,
        osi_symbols: &str,
    ) -> Result<GatewayResponse, GatewayError> {
        let path = format!("/userapigateway/option-details/{}/greeks", account_id);
        let builder = self
            .request(Method::GET, &path)
            .await?
            .query(&[("osiSymbols", osi_symbols)]);
        self.execute(builder).await
    }

    async fn preflight_single(
        &self,
        account_id: &str,
        body: &Value,
    ) -> Result<GatewayResponse, GatewayError> {
        let path = format!("/userapigateway/trading/{}/preflight/single-leg", account_id);
        let builder = self.request(Method::POST, &path).await?.json(body);
        self.execute(builder).await
    }

    async fn preflight_multi(
        &self,
        account_id: &str,
        body: &Value,
    ) -> Result<GatewayResponse, GatewayError> {
        let path = format!("/userapigateway/trading/{}/preflight/multi-leg", account_id);
        let builder = self.request(Method::POST, &path).await?.json(body);
        self.execute(builder).await
    }

    async fn place_order(
        &self,
        account_id: &str,
        body: &Value,
    ) -> Result<GatewayResponse, GatewayError> {
        let path = format!("/userapigateway/trading/{}/order", account_id);
        let builder = self.request(Method::POST, &path).await?.json(body);
        self.execute(builder).await
    }

    async fn cancel_order(
        &self,
        account_id: &str,
        order_id: &str,
    ) -> Result<GatewayResponse, GatewayError> {
        let path = format!("/userapigateway/trading/{}/order/{}", account_id, order_id);
        let builder = self.request(Method::DELETE, &path).await?;
        self.execute(builder).await
    }

    async fn order_status(
        &self,
        account_id: &str,
        order_id: &str,
    ) -> Result<OrderLookup, GatewayError> {
        let path = format!("/userapigateway/trading/{}/order/{}", account_id, order_id);
        let builder = self.request(Method::GET, &path).await?;
        let response = self.execute(builder).await?;

        // Upstream can return 404 shortly after placement due to eventual
        // consistency; that is "not indexed yet", never an error. Any other
        // non-2xx reply carries no order state and must not be merged.
        if response.status == StatusCode::NOT_FOUND.as_u16() {
            return Ok(OrderLookup::NotYetIndexed);
        }
        if !response.is_success() {
            return Ok(OrderLookup::Failed(response));
        }

        Ok(OrderLookup::Found(response.json()))
    }
}
