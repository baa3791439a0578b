//! Credential wiring for L2 HMAC authentication.
//!
//! The HMAC signing itself lives in `polymarket_client::auth`; this module
//! just builds a `PolymarketAuth` from the config-sourced secrets this core
//! runs with (no wallet, no L1 derivation).

use crate::infrastructure::config::PolymarketConfig;
use polymarket_client::{ApiCredentials, PolymarketAuth};

pub fn build_auth(config: &PolymarketConfig) -> PolymarketAuth {
    PolymarketAuth::new(ApiCredentials {
        key: config.api_key.clone(),
        secret: config.api_secret.clone(),
        passphrase: config.api_passphrase.clone(),
    })
}
