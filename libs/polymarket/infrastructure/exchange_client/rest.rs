//! `ExchangeClient` implementation over the CLOB REST API and the Gamma
//! markets-metadata API.

use crate::application::ports::{
    BookPayload, CandidateMarket, ExchangeClient, ExchangeError, PlaceOrderRequest, PlaceOrderResponse,
    RemoteOrderState, RemoteOrderStatus, Result,
};
use crate::domain::order::Side as DomainSide;
use async_trait::async_trait;
use parking_lot::Mutex;
use polymarket_client::{GammaClient, GammaFilters, GammaMarket, OrderArgs, OrderType, PolymarketAuth, RestClient, Side as WireSide};
use std::collections::HashSet;
use std::time::Instant;
use tracing::warn;

fn domain_to_wire_side(side: DomainSide) -> WireSide {
    match side {
        DomainSide::Buy => WireSide::Buy,
        DomainSide::Sell => WireSide::Sell,
    }
}

/// A market only qualifies as a binary YES/NO pair if its outcome labels are
/// exactly `{"Yes", "No"}`; token IDs are then mapped by label, not by
/// position (Gamma does not guarantee `clob_token_ids` is YES-first).
fn to_candidate(m: GammaMarket) -> Option<CandidateMarket> {
    let tokens = m.clob_token_ids.unwrap_or_default();
    let outcomes = m.outcomes.unwrap_or_default();
    if tokens.len() != 2 || outcomes.len() != 2 {
        return None;
    }
    let outcome_set: HashSet<&str> = outcomes.iter().map(String::as_str).collect();
    if outcome_set != HashSet::from(["Yes", "No"]) {
        return None;
    }
    let yes_idx = outcomes.iter().position(|o| o == "Yes")?;
    let no_idx = outcomes.iter().position(|o| o == "No")?;
    Some(CandidateMarket {
        market_id: m.id,
        condition_id: m.condition_id,
        question: m.question,
        yes_token_id: tokens[yes_idx].clone(),
        no_token_id: tokens[no_idx].clone(),
        accepting_orders: m.active && !m.closed && !m.archived,
        has_order_book: true,
    })
}

fn map_rest_err(e: polymarket_client::RestError) -> ExchangeError {
    match e {
        polymarket_client::RestError::RateLimited => ExchangeError::RateLimited,
        other => ExchangeError::Transport(other.to_string()),
    }
}

fn parse_remote_state(status: &str) -> RemoteOrderState {
    match status.to_ascii_uppercase().as_str() {
        "LIVE" | "OPEN" => RemoteOrderState::Open,
        "MATCHED" => RemoteOrderState::Matched,
        "CANCELED" | "CANCELLED" => RemoteOrderState::Cancelled,
        "EXPIRED" => RemoteOrderState::Expired,
        other => {
            warn!(status = other, "unrecognized remote order status, treating as pending");
            RemoteOrderState::Pending
        }
    }
}

/// Wraps the CLOB `RestClient` (orders, books) and the Gamma `GammaClient`
/// (market discovery) behind the application layer's `ExchangeClient` port.
pub struct PolymarketExchangeClient {
    rest: RestClient,
    gamma: GammaClient,
    auth: PolymarketAuth,
    last_latency_ms: Mutex<Option<u64>>,
}

impl PolymarketExchangeClient {
    pub fn new(clob_base_url: impl Into<String>, gamma_base_url: impl Into<String>, auth: PolymarketAuth) -> Self {
        Self {
            rest: RestClient::new(clob_base_url),
            gamma: GammaClient::new(gamma_base_url),
            auth,
            last_latency_ms: Mutex::new(None),
        }
    }

    fn record_latency(&self, started: Instant) {
        let elapsed = started.elapsed().as_millis() as u64;
        *self.last_latency_ms.lock() = Some(elapsed);
    }
}

#[async_trait]
impl ExchangeClient for PolymarketExchangeClient {
    async fn list_markets(&self, cursor: Option<String>) -> Result<(Vec<CandidateMarket>, Option<String>)> {
        let offset: usize = cursor.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0);
        const PAGE: usize = 100;

        let started = Instant::now();
        let filters = GammaFilters { active: Some(true), closed: Some(false), archived: Some(false), ..Default::default() };
        let markets = match self.gamma.get_markets_page(PAGE, offset, filters.clone()).await {
            Err(polymarket_client::GammaError::RateLimitExceeded) => {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                self.gamma.get_markets_page(PAGE, offset, filters).await.map_err(|e| ExchangeError::Transport(e.to_string()))?
            }
            Err(e) => return Err(ExchangeError::Transport(e.to_string())),
            Ok(markets) => markets,
        };
        self.record_latency(started);

        let next_cursor = if markets.len() == PAGE { Some((offset + PAGE).to_string()) } else { None };

        let candidates = markets.into_iter().filter_map(to_candidate).collect();

        Ok((candidates, next_cursor))
    }

    async fn get_book(&self, token_id: &str) -> Result<BookPayload> {
        let started = Instant::now();
        let book = self.rest.get_orderbook(token_id).await.map_err(map_rest_err)?;
        self.record_latency(started);

        Ok(BookPayload {
            bids: book.bids.iter().map(|l| (l.price_f64(), l.size_f64())).collect(),
            asks: book.asks.iter().map(|l| (l.price_f64(), l.size_f64())).collect(),
        })
    }

    async fn place_order(&self, req: PlaceOrderRequest) -> Result<PlaceOrderResponse> {
        let order_args = OrderArgs {
            token_id: req.token_id,
            price: req.price,
            size: req.size,
            side: domain_to_wire_side(req.side),
            fee_rate_bps: None,
            nonce: None,
            expiration: None,
        };

        let started = Instant::now();
        let response = self
            .rest
            .place_order(&self.auth, &order_args, OrderType::GTC)
            .await
            .map_err(map_rest_err)?;
        self.record_latency(started);

        if !response.success {
            return Err(ExchangeError::Rejected(response.error_msg.unwrap_or_else(|| "rejected".to_string())));
        }
        Ok(PlaceOrderResponse { order_id: response.order_id })
    }

    async fn get_order(&self, order_id: &str) -> Result<RemoteOrderStatus> {
        let started = Instant::now();
        let status = self.rest.get_order(&self.auth, order_id).await.map_err(map_rest_err)?;
        self.record_latency(started);

        Ok(RemoteOrderStatus { state: parse_remote_state(&status.status), size_matched: status.size_matched_f64() })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let started = Instant::now();
        self.rest.cancel_order(&self.auth, order_id).await.map_err(map_rest_err)?;
        self.record_latency(started);
        Ok(())
    }

    async fn cancel_all(&self) -> Result<usize> {
        let started = Instant::now();
        let response = self.rest.cancel_all(&self.auth).await.map_err(map_rest_err)?;
        self.record_latency(started);
        Ok(response.canceled.len())
    }

    fn last_latency_ms(&self) -> Option<u64> {
        *self.last_latency_ms.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_state_parses_known_statuses() {
        assert_eq!(parse_remote_state("live"), RemoteOrderState::Open);
        assert_eq!(parse_remote_state("MATCHED"), RemoteOrderState::Matched);
        assert_eq!(parse_remote_state("Canceled"), RemoteOrderState::Cancelled);
        assert_eq!(parse_remote_state("expired"), RemoteOrderState::Expired);
    }

    #[test]
    fn remote_state_defaults_unknown_to_pending() {
        assert_eq!(parse_remote_state("bogus"), RemoteOrderState::Pending);
    }

    #[test]
    fn map_rest_err_preserves_rate_limited_distinctly() {
        assert!(matches!(map_rest_err(polymarket_client::RestError::RateLimited), ExchangeError::RateLimited));
        let transport = map_rest_err(polymarket_client::RestError::ApiError("boom".to_string()));
        assert!(matches!(transport, ExchangeError::Transport(_)));
    }

    fn gamma_market(outcomes: Option<Vec<&str>>, token_ids: Option<Vec<&str>>) -> GammaMarket {
        GammaMarket {
            id: "m1".to_string(),
            condition_id: "c1".to_string(),
            question: "will it happen?".to_string(),
            slug: None,
            start_date: String::new(),
            end_date: String::new(),
            active: true,
            closed: false,
            archived: false,
            market_type: None,
            category: None,
            liquidity: None,
            volume: None,
            volume_24hr: None,
            outcomes: outcomes.map(|o| o.into_iter().map(String::from).collect()),
            clob_token_ids: token_ids.map(|t| t.into_iter().map(String::from).collect()),
            tags: Vec::new(),
        }
    }

    #[test]
    fn to_candidate_maps_tokens_by_outcome_label_not_position() {
        let m = gamma_market(Some(vec!["No", "Yes"]), Some(vec!["tok-no", "tok-yes"]));
        let c = to_candidate(m).expect("valid binary market");
        assert_eq!(c.yes_token_id, "tok-yes");
        assert_eq!(c.no_token_id, "tok-no");
    }

    #[test]
    fn to_candidate_rejects_non_binary_outcome_sets() {
        let m = gamma_market(Some(vec!["Up", "Down"]), Some(vec!["tok-a", "tok-b"]));
        assert!(to_candidate(m).is_none());
    }

    #[test]
    fn to_candidate_rejects_missing_outcomes_or_tokens() {
        assert!(to_candidate(gamma_market(None, Some(vec!["a", "b"]))).is_none());
        assert!(to_candidate(gamma_market(Some(vec!["Yes", "No"]), None)).is_none());
    }
}
