use crate::types::ApiCredentials;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HMAC error: {0}")]
    HmacError(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// Exchange L2 authentication.
///
/// Credentials arrive fully formed from configuration rather than being
/// derived from a wallet: on-chain signing (L1 EIP-712, API-key derivation
/// from a private key) is out of scope here.
pub struct PolymarketAuth {
    api_key: ApiCredentials,
}

impl PolymarketAuth {
    pub fn new(api_key: ApiCredentials) -> Self {
        Self { api_key }
    }

    pub fn api_key(&self) -> &ApiCredentials {
        &self.api_key
    }

    /// Generate L2 HMAC signature for API requests.
    pub fn sign_l2_request(&self, timestamp: u64, method: &str, path: &str, body: &str) -> Result<String> {
        let message = format!("{}{}{}{}", timestamp, method, path, body);

        let mut mac = HmacSha256::new_from_slice(self.api_key.secret.as_bytes())
            .map_err(|e| AuthError::HmacError(e.to_string()))?;
        mac.update(message.as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Build L2 authentication headers for API requests.
    pub fn l2_headers(&self, timestamp: u64, method: &str, path: &str, body: &str) -> Result<HashMap<String, String>> {
        let signature = self.sign_l2_request(timestamp, method, path, body)?;

        let mut headers = HashMap::new();
        headers.insert("POLY_SIGNATURE".to_string(), signature);
        headers.insert("POLY_TIMESTAMP".to_string(), timestamp.to_string());
        headers.insert("POLY_API_KEY".to_string(), self.api_key.key.clone());
        headers.insert("POLY_PASSPHRASE".to_string(), self.api_key.passphrase.clone());

        Ok(headers)
    }

    /// Get current Unix timestamp in seconds.
    pub fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> ApiCredentials {
        ApiCredentials {
            key: "test_key".to_string(),
            secret: "test_secret".to_string(),
            passphrase: "test_pass".to_string(),
        }
    }

    #[test]
    fn test_l2_signature_deterministic() {
        let auth = PolymarketAuth::new(creds());
        let a = auth.sign_l2_request(1234567890, "GET", "/book", "").unwrap();
        let b = auth.sign_l2_request(1234567890, "GET", "/book", "").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_l2_signature_changes_with_input() {
        let auth = PolymarketAuth::new(creds());
        let a = auth.sign_l2_request(1234567890, "GET", "/book", "").unwrap();
        let b = auth.sign_l2_request(1234567890, "POST", "/book", "").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_l2_headers_present() {
        let auth = PolymarketAuth::new(creds());
        let headers = auth.l2_headers(1234567890, "GET", "/markets", "").unwrap();
        assert_eq!(headers.get("POLY_API_KEY").unwrap(), "test_key");
        assert_eq!(headers.get("POLY_PASSPHRASE").unwrap(), "test_pass");
        assert!(headers.contains_key("POLY_SIGNATURE"));
    }
}
