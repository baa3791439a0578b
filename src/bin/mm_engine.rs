//! Market-making engine entry point: load config, wire the exchange client,
//! durable store, and application services, then run until Ctrl+C.

use anyhow::Context;
use chrono::Utc;
use market_db::MarketDatabase;
use polymarket::application::{Engine, ExecutionController, QuoteGenerator, RiskGate};
use polymarket::infrastructure::exchange_client::{build_auth, run_book_stream, PolymarketExchangeClient};
use polymarket::infrastructure::BotConfig;
use polymarket::MarketRegistry;
use polymarket_mm_bot::bin_common::{load_config_from_env, ConfigType};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = load_config_from_env(ConfigType::Bot);
    let config = BotConfig::load(&config_path).with_context(|| format!("loading config from {:?}", config_path))?;

    polymarket::infrastructure::init_tracing_with_level(&config.logging.level);

    tracing::info!(path = ?config_path, "loaded configuration");

    let store = Arc::new(MarketDatabase::new(&config.database.url).await.context("opening durable store")?);

    let auth = build_auth(&config.polymarket);
    let client = Arc::new(PolymarketExchangeClient::new(
        config.polymarket.clob_base_url.clone(),
        config.polymarket.gamma_url.clone(),
        auth,
    ));

    let registry = MarketRegistry::new(config.strategy.max_markets);
    let generator = QuoteGenerator::new(config.quote_generator_config());
    let risk_gate = RiskGate::new(config.risk_gate_config(), Utc::now());
    let execution = Arc::new(ExecutionController::new(client.clone(), store, risk_gate, config.execution_config()));

    let engine = Engine::new(config.engine_config(), client, registry, generator, execution);

    let mut events = engine.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(?event, "engine event");
        }
    });

    engine.start().await;

    let ws_url = config.polymarket.ws_url.clone();
    let books_for_stream = engine.clone();
    let stream_state = engine.ws_handles();
    tokio::spawn(async move {
        // Waits for the first discovery pass, then subscribes to that token
        // set for the life of the process; `run_book_stream` itself
        // reconnects forever on disconnect. Markets discovered afterward are
        // still kept fresh by the engine's REST backfill loop, just without
        // the WS push path.
        let mut tokens = Vec::new();
        while tokens.is_empty() {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            tokens = books_for_stream.tracked_token_ids();
        }
        run_book_stream(ws_url, books_for_stream.book_store(), tokens, stream_state).await;
    });

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutdown signal received");
    engine.stop().await;

    Ok(())
}
