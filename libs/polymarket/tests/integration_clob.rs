//! Integration tests for the CLOB exchange client.
//!
//! The live tests talk to the real Polymarket API and are marked `#[ignore]`:
//!
//! ```bash
//! export API_KEY="..."
//! export API_SECRET="..."
//! export API_PASSPHRASE="..."
//! cargo test -p polymarket --test integration_clob -- --ignored
//! ```

mod common;

use polymarket::infrastructure::exchange_client::PolymarketExchangeClient;
use polymarket::infrastructure::BotConfig;
use polymarket_client::{ApiCredentials, PolymarketAuth};
use std::env;

fn has_credentials() -> bool {
    env::var("API_KEY").is_ok() && env::var("API_SECRET").is_ok() && env::var("API_PASSPHRASE").is_ok()
}

macro_rules! require_credentials {
    () => {
        if !has_credentials() {
            println!("skipping: API_KEY/API_SECRET/API_PASSPHRASE not set");
            return;
        }
    };
}

// ============================================================================
// Credential / header construction (no network)
// ============================================================================

#[test]
fn l2_headers_cover_the_required_set() {
    let auth = PolymarketAuth::new(ApiCredentials {
        key: "test-key".to_string(),
        secret: "dGVzdC1zZWNyZXQ=".to_string(),
        passphrase: "test-pass".to_string(),
    });

    let headers = auth
        .l2_headers(1_700_000_000, "GET", "/order/123", "")
        .expect("header build should not fail with well-formed inputs");

    for key in ["POLY_SIGNATURE", "POLY_TIMESTAMP", "POLY_API_KEY", "POLY_PASSPHRASE"] {
        assert!(headers.contains_key(key), "missing header {key}");
    }
}

#[test]
fn l2_headers_are_deterministic_for_same_inputs() {
    let auth = PolymarketAuth::new(ApiCredentials {
        key: "test-key".to_string(),
        secret: "dGVzdC1zZWNyZXQ=".to_string(),
        passphrase: "test-pass".to_string(),
    });

    let h1 = auth.l2_headers(1_700_000_000, "POST", "/order", "{}").unwrap();
    let h2 = auth.l2_headers(1_700_000_000, "POST", "/order", "{}").unwrap();
    assert_eq!(h1.get("POLY_SIGNATURE"), h2.get("POLY_SIGNATURE"));
}

#[test]
fn l2_headers_change_signature_when_body_changes() {
    let auth = PolymarketAuth::new(ApiCredentials {
        key: "test-key".to_string(),
        secret: "dGVzdC1zZWNyZXQ=".to_string(),
        passphrase: "test-pass".to_string(),
    });

    let h1 = auth.l2_headers(1_700_000_000, "POST", "/order", "{\"size\":1}").unwrap();
    let h2 = auth.l2_headers(1_700_000_000, "POST", "/order", "{\"size\":2}").unwrap();
    assert_ne!(h1.get("POLY_SIGNATURE"), h2.get("POLY_SIGNATURE"));
}

// ============================================================================
// Response parsing (no network)
// ============================================================================

#[test]
fn order_placement_response_parses() {
    let response = serde_json::json!({
        "success": true,
        "orderID": "0x123abc",
        "errorMsg": null
    });

    assert!(response["success"].as_bool().unwrap_or(false));
    assert_eq!(response["orderID"].as_str(), Some("0x123abc"));
}

#[test]
fn cancel_all_response_parses() {
    let response = serde_json::json!({
        "canceled": ["0x123", "0x456"],
        "not_canceled": {}
    });

    let canceled: Vec<String> = serde_json::from_value(response["canceled"].clone()).unwrap();
    assert_eq!(canceled.len(), 2);
}

// ============================================================================
// Live smoke tests (require credentials + network)
// ============================================================================

#[tokio::test]
#[ignore]
async fn live_list_markets_returns_candidates() {
    require_credentials!();
    let _ = dotenv::dotenv();

    let config = BotConfig::load(std::path::Path::new("config/bot.yaml")).expect("bot config");
    let auth = polymarket::infrastructure::exchange_client::build_auth(&config.polymarket);
    let client = PolymarketExchangeClient::new(config.polymarket.clob_base_url.clone(), config.polymarket.gamma_url.clone(), auth);

    use polymarket::application::ExchangeClient as _;
    let (markets, _next_cursor) = client.list_markets(None).await.expect("list_markets should succeed with valid credentials");
    println!("discovered {} candidate markets", markets.len());
}

#[tokio::test]
#[ignore]
async fn live_cancel_all_does_not_error() {
    require_credentials!();
    let _ = dotenv::dotenv();

    let config = BotConfig::load(std::path::Path::new("config/bot.yaml")).expect("bot config");
    let auth = polymarket::infrastructure::exchange_client::build_auth(&config.polymarket);
    let client = PolymarketExchangeClient::new(config.polymarket.clob_base_url.clone(), config.polymarket.gamma_url.clone(), auth);

    use polymarket::application::ExchangeClient as _;
    client.cancel_all().await.expect("cancel_all should succeed even with nothing open");
}
