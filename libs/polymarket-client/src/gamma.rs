use crate::gamma_types::{GammaEvent, GammaFilters, GammaMarket};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GammaError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

pub type Result<T> = std::result::Result<T, GammaError>;

const PAGE_LIMIT: usize = 100;

/// Gamma Markets metadata API client, used for market discovery and
/// enrichment alongside the CLOB [`crate::RestClient`].
pub struct GammaClient {
    base_url: String,
    client: Client,
}

impl GammaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    pub async fn get_all_active_markets(&self) -> Result<Vec<GammaMarket>> {
        let filters = GammaFilters {
            active: Some(true),
            closed: Some(false),
            archived: Some(false),
            ..Default::default()
        };

        self.get_all_markets_with_filters(filters).await
    }

    pub async fn get_all_markets_with_filters(&self, filters: GammaFilters) -> Result<Vec<GammaMarket>> {
        let mut all_markets = Vec::new();
        let mut offset = 0;

        info!("Starting paginated market fetch");

        loop {
            debug!("Fetching page: offset={}, limit={}", offset, PAGE_LIMIT);

            let markets = self.get_markets_page(PAGE_LIMIT, offset, filters.clone()).await?;
            let count = markets.len();
            all_markets.extend(markets);

            if count < PAGE_LIMIT {
                debug!("Reached end of pagination (got {} < {})", count, PAGE_LIMIT);
                break;
            }

            offset += PAGE_LIMIT;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!("Fetched total of {} markets", all_markets.len());
        Ok(all_markets)
    }

    pub async fn get_markets_page(
        &self,
        limit: usize,
        offset: usize,
        filters: GammaFilters,
    ) -> Result<Vec<GammaMarket>> {
        let url = format!("{}/markets", self.base_url);

        let mut params = filters.to_query_params();
        params.push(("limit".to_string(), limit.to_string()));
        params.push(("offset".to_string(), offset.to_string()));
        params.push(("order".to_string(), "id".to_string()));
        params.push(("ascending".to_string(), "false".to_string()));

        debug!("GET {} with {} params", url, params.len());

        let response = self.client.get(&url).query(&params).send().await?;
        let status = response.status();

        if status == 429 {
            warn!("Rate limit exceeded");
            return Err(GammaError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GammaError::ApiError(format!(
                "Failed to fetch markets ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GammaError::DeserializeFailed(e.to_string()))
    }

    pub async fn get_new_markets(&self, since: DateTime<Utc>) -> Result<Vec<GammaMarket>> {
        let filters = GammaFilters {
            active: Some(true),
            closed: Some(false),
            start_date_min: Some(since),
            ..Default::default()
        };

        self.get_markets_page(PAGE_LIMIT, 0, filters).await
    }

    pub async fn get_all_active_events(&self) -> Result<Vec<GammaEvent>> {
        let mut all_events = Vec::new();
        let mut offset = 0;

        info!("Starting paginated event fetch");

        loop {
            let events = self.get_events_page(PAGE_LIMIT, offset).await?;
            let count = events.len();
            all_events.extend(events);

            if count < PAGE_LIMIT {
                break;
            }

            offset += PAGE_LIMIT;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!("Fetched total of {} events", all_events.len());
        Ok(all_events)
    }

    pub async fn get_events_page(&self, limit: usize, offset: usize) -> Result<Vec<GammaEvent>> {
        let url = format!("{}/events", self.base_url);

        let limit_str = limit.to_string();
        let offset_str = offset.to_string();

        let params = vec![
            ("closed", "false"),
            ("limit", &limit_str),
            ("offset", &offset_str),
            ("order", "id"),
            ("ascending", "false"),
        ];

        debug!("GET {} with params {:?}", url, params);

        let response = self.client.get(&url).query(&params).send().await?;
        let status = response.status();

        if status == 429 {
            warn!("Rate limit exceeded");
            return Err(GammaError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GammaError::ApiError(format!(
                "Failed to fetch events ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GammaError::DeserializeFailed(e.to_string()))
    }

    pub fn extract_markets_from_events(events: Vec<GammaEvent>) -> Vec<GammaMarket> {
        events.into_iter().flat_map(|event| event.markets).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gamma_client_creation() {
        let client = GammaClient::new("https://gamma-api.polymarket.com");
        assert_eq!(client.base_url, "https://gamma-api.polymarket.com");
    }

    #[test]
    fn test_filters_to_query_params() {
        let filters = GammaFilters {
            active: Some(true),
            closed: Some(false),
            ..Default::default()
        };
        let params = filters.to_query_params();
        assert!(params.contains(&("active".to_string(), "true".to_string())));
        assert!(params.contains(&("closed".to_string(), "false".to_string())));
    }
}
