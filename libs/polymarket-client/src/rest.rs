use crate::auth::PolymarketAuth;
use crate::types::*;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(#[from] crate::auth::AuthError),

    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),

    #[error("rate limited after retry")]
    RateLimited,
}

pub type Result<T> = std::result::Result<T, RestError>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// REST API client for Polymarket CLOB
pub struct RestClient {
    base_url: String,
    client: Client,
}

impl RestClient {
    /// Create new REST client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_else(|_| Client::new()),
        }
    }

    /// Sends `req`, retrying once after a short delay if the exchange answers
    /// with HTTP 429. A second 429 gives up with `RestError::RateLimited`
    /// rather than retrying indefinitely.
    async fn send_with_retry(&self, req: RequestBuilder) -> Result<Response> {
        let retry = req.try_clone();
        let response = req.send().await?;
        if response.status().as_u16() != 429 {
            return Ok(response);
        }

        warn!("rate limited, retrying once");
        let Some(retry) = retry else {
            return Err(RestError::RateLimited);
        };
        tokio::time::sleep(RATE_LIMIT_RETRY_DELAY).await;
        let response = retry.send().await?;
        if response.status().as_u16() == 429 {
            return Err(RestError::RateLimited);
        }
        Ok(response)
    }

    /// Get all simplified markets
    pub async fn get_markets(&self) -> Result<Vec<Market>> {
        let url = format!("{}/markets", self.base_url);

        debug!("Fetching markets from {}", url);

        let response = self.send_with_retry(self.client.get(&url)).await?;

        if !response.status().is_success() {
            return Err(RestError::ApiError(format!(
                "Failed to fetch markets: {}",
                response.status()
            )));
        }

        let simplified: Vec<SimplifiedMarket> = response
            .json()
            .await
            .map_err(|e| RestError::DeserializeFailed(e.to_string()))?;

        // Convert to Market structs
        let mut markets = Vec::new();
        for sm in simplified {
            match sm.into_market() {
                Ok(market) => markets.push(market),
                Err(e) => {
                    warn!("Failed to parse market: {}", e);
                    continue;
                }
            }
        }

        debug!("Fetched {} markets", markets.len());
        Ok(markets)
    }

    /// Get specific market by condition ID
    pub async fn get_market(&self, condition_id: &str) -> Result<Market> {
        let url = format!("{}/markets/{}", self.base_url, condition_id);

        debug!("Fetching market {} from {}", condition_id, url);

        let response = self.send_with_retry(self.client.get(&url)).await?;

        if !response.status().is_success() {
            return Err(RestError::ApiError(format!(
                "Failed to fetch market: {}",
                response.status()
            )));
        }

        let simplified: SimplifiedMarket = response
            .json()
            .await
            .map_err(|e| RestError::DeserializeFailed(e.to_string()))?;

        simplified
            .into_market()
            .map_err(|e| RestError::DeserializeFailed(e.to_string()))
    }

    /// Get orderbook for a specific token
    pub async fn get_orderbook(&self, token_id: &str) -> Result<OrderBook> {
        let url = format!("{}/book?token_id={}", self.base_url, token_id);

        debug!("Fetching orderbook for token {} from {}", token_id, url);

        let response = self.send_with_retry(self.client.get(&url)).await?;

        if !response.status().is_success() {
            return Err(RestError::ApiError(format!(
                "Failed to fetch orderbook: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RestError::DeserializeFailed(e.to_string()))
    }

    /// Place a limit order
    pub async fn place_order(
        &self,
        auth: &PolymarketAuth,
        order_args: &OrderArgs,
        order_type: OrderType,
    ) -> Result<OrderResponse> {
        let url = format!("{}/order", self.base_url);
        let timestamp = PolymarketAuth::current_timestamp();

        debug!("Placing {:?} order for token {}", order_type, order_args.token_id);

        // Serialize order body
        let body_json = json!({
            "order": order_args,
            "orderType": order_type,
        });
        let body = serde_json::to_string(&body_json)
            .map_err(|e| RestError::ApiError(e.to_string()))?;

        // Get L2 headers
        let headers = auth.l2_headers(timestamp, "POST", "/order", &body)?;

        // Build request
        let mut req = self.client.post(&url).header("Content-Type", "application/json");
        for (key, value) in headers {
            req = req.header(key, value);
        }

        let response = self.send_with_retry(req.body(body)).await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RestError::ApiError(format!(
                "Failed to place order: {}",
                error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RestError::DeserializeFailed(e.to_string()))
    }

    /// Place a market order (buy/sell by amount)
    pub async fn place_market_order(
        &self,
        auth: &PolymarketAuth,
        market_order: &MarketOrderArgs,
        order_type: OrderType,
    ) -> Result<OrderResponse> {
        debug!(
            "Placing market {:?} order for {} USD",
            market_order.side, market_order.amount
        );

        // Get current best price for the side
        let orderbook = self.get_orderbook(&market_order.token_id).await?;

        // Calculate price and size
        let (price, size) = match market_order.side {
            Side::Buy => {
                // For market buy, use best ask price
                let best_ask = orderbook
                    .asks
                    .first()
                    .ok_or_else(|| RestError::ApiError("No asks available".to_string()))?;
                let price = best_ask.price_f64();
                let size = market_order.amount / price;
                (price, size)
            }
            Side::Sell => {
                // For market sell, use best bid price
                let best_bid = orderbook
                    .bids
                    .first()
                    .ok_or_else(|| RestError::ApiError("No bids available".to_string()))?;
                let price = best_bid.price_f64();
                let size = market_order.amount / price;
                (price, size)
            }
        };

        // Create limit order with marketable price
        let order_args = OrderArgs {
            token_id: market_order.token_id.clone(),
            price,
            size,
            side: market_order.side,
            fee_rate_bps: None,
            nonce: None,
            expiration: None,
        };

        self.place_order(auth, &order_args, order_type).await
    }

    /// Get the status of a previously placed order.
    pub async fn get_order(&self, auth: &PolymarketAuth, order_id: &str) -> Result<OrderStatusResponse> {
        let path = format!("/data/order/{}", order_id);
        let url = format!("{}{}", self.base_url, path);
        let timestamp = PolymarketAuth::current_timestamp();

        debug!("Fetching order status for {}", order_id);

        let headers = auth.l2_headers(timestamp, "GET", &path, "")?;
        let mut req = self.client.get(&url);
        for (key, value) in headers {
            req = req.header(key, value);
        }

        let response = self.send_with_retry(req).await?;
        if !response.status().is_success() {
            return Err(RestError::ApiError(format!(
                "Failed to fetch order status: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RestError::DeserializeFailed(e.to_string()))
    }

    /// Cancel a single resting order.
    pub async fn cancel_order(&self, auth: &PolymarketAuth, order_id: &str) -> Result<()> {
        let path = "/order";
        let url = format!("{}{}", self.base_url, path);
        let timestamp = PolymarketAuth::current_timestamp();
        let body = serde_json::to_string(&json!({ "orderID": order_id }))
            .map_err(|e| RestError::ApiError(e.to_string()))?;

        let headers = auth.l2_headers(timestamp, "DELETE", path, &body)?;
        let mut req = self.client.delete(&url).header("Content-Type", "application/json");
        for (key, value) in headers {
            req = req.header(key, value);
        }

        let response = self.send_with_retry(req.body(body)).await?;
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RestError::ApiError(format!("Failed to cancel order: {}", error_text)));
        }
        Ok(())
    }

    /// Cancel every resting order for the authenticated account.
    pub async fn cancel_all(&self, auth: &PolymarketAuth) -> Result<CancelResponse> {
        let path = "/cancel-all";
        let url = format!("{}{}", self.base_url, path);
        let timestamp = PolymarketAuth::current_timestamp();

        let headers = auth.l2_headers(timestamp, "DELETE", path, "")?;
        let mut req = self.client.delete(&url);
        for (key, value) in headers {
            req = req.header(key, value);
        }

        let response = self.send_with_retry(req).await?;
        if !response.status().is_success() {
            return Err(RestError::ApiError(format!(
                "Failed to cancel all orders: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RestError::DeserializeFailed(e.to_string()))
    }

    /// Get user positions
    pub async fn get_positions(&self, auth: &PolymarketAuth) -> Result<Vec<Position>> {
        let url = format!("{}/positions", self.base_url);
        let timestamp = PolymarketAuth::current_timestamp();

        debug!("Fetching user positions");

        // Get L2 headers
        let headers = auth.l2_headers(timestamp, "GET", "/positions", "")?;

        // Build request
        let mut req = self.client.get(&url);
        for (key, value) in headers {
            req = req.header(key, value);
        }

        let response = self.send_with_retry(req).await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RestError::ApiError(format!(
                "Failed to fetch positions: {}",
                error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RestError::DeserializeFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = RestClient::new("https://clob.polymarket.com");
        assert_eq!(client.base_url, "https://clob.polymarket.com");
    }
}
