use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A binary prediction market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    #[serde(rename = "condition_id")]
    pub id: String,

    pub question: String,

    #[serde(rename = "end_date_iso")]
    pub resolution_time: DateTime<Utc>,

    #[serde(rename = "tokens")]
    pub outcomes: Vec<Outcome>,

    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub closed: bool,
}

/// One outcome token (YES or NO) within a market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(rename = "token_id")]
    pub id: String,

    pub outcome: String,

    #[serde(default)]
    pub price: Option<f64>,
}

/// Order book for a single token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub market: String,
    pub asset_id: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,

    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub hash: Option<String>,

    #[serde(default)]
    pub min_order_size: Option<String>,

    #[serde(default)]
    pub tick_size: Option<String>,

    #[serde(default)]
    pub neg_risk: Option<bool>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }
}

/// Price level in an order book. Kept as strings to avoid float precision
/// issues on the wire; callers round to their own numeric policy on parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: String,
    pub size: String,
}

impl PriceLevel {
    pub fn price_f64(&self) -> f64 {
        self.price.parse().unwrap_or(0.0)
    }

    pub fn size_f64(&self) -> f64 {
        self.size.parse().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    GTC,
    FOK,
    GTD,
}

/// Order creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderArgs {
    pub token_id: String,
    pub price: f64,
    pub size: f64,
    pub side: Side,

    #[serde(rename = "feeRateBps", skip_serializing_if = "Option::is_none")]
    pub fee_rate_bps: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<u64>,
}

/// Market order request (buy/sell by notional amount rather than size).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOrderArgs {
    pub token_id: String,
    pub amount: f64,
    pub side: Side,
}

/// Response returned by the exchange after submitting an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    #[serde(rename = "orderID")]
    pub order_id: String,

    pub success: bool,

    #[serde(default)]
    pub error_msg: Option<String>,
}

/// A held position in a single token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub asset_id: String,
    pub market: String,
    pub size: String,

    #[serde(default)]
    pub side: Option<Side>,
}

impl Position {
    pub fn size_f64(&self) -> f64 {
        self.size.parse().unwrap_or(0.0)
    }
}

/// Order status as reported by the CLOB order-status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusResponse {
    #[serde(rename = "id")]
    pub order_id: String,

    pub status: String,

    #[serde(rename = "size_matched", default)]
    pub size_matched: String,
}

impl OrderStatusResponse {
    pub fn size_matched_f64(&self) -> f64 {
        self.size_matched.parse().unwrap_or(0.0)
    }
}

/// Response from cancelling a single order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    #[serde(default)]
    pub canceled: Vec<String>,

    #[serde(default)]
    pub not_canceled: std::collections::HashMap<String, String>,
}

/// L2 API credentials, configured directly rather than derived from a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCredentials {
    pub key: String,
    pub secret: String,
    pub passphrase: String,
}

/// Simplified market shape as returned by the markets listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifiedMarket {
    #[serde(rename = "condition_id")]
    pub condition_id: String,

    pub question: String,

    #[serde(rename = "end_date_iso")]
    pub end_date_iso: String,

    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub closed: bool,

    #[serde(default)]
    pub tokens: Vec<SimplifiedToken>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifiedToken {
    #[serde(rename = "token_id")]
    pub token_id: String,

    pub outcome: String,

    #[serde(default)]
    pub price: Option<String>,
}

impl SimplifiedMarket {
    pub fn into_market(self) -> Result<Market, chrono::ParseError> {
        Ok(Market {
            id: self.condition_id,
            question: self.question,
            resolution_time: DateTime::parse_from_rfc3339(&self.end_date_iso)?
                .with_timezone(&Utc),
            outcomes: self
                .tokens
                .into_iter()
                .map(|t| Outcome {
                    id: t.token_id,
                    outcome: t.outcome,
                    price: t.price.and_then(|p| p.parse().ok()),
                })
                .collect(),
            active: self.active,
            closed: self.closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_level_parses() {
        let level = PriceLevel { price: "0.42".to_string(), size: "100".to_string() };
        assert_eq!(level.price_f64(), 0.42);
        assert_eq!(level.size_f64(), 100.0);
    }

    #[test]
    fn price_level_defaults_on_garbage() {
        let level = PriceLevel { price: "nope".to_string(), size: "".to_string() };
        assert_eq!(level.price_f64(), 0.0);
        assert_eq!(level.size_f64(), 0.0);
    }
}
