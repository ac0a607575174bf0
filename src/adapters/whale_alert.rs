//! Whale Alert REST adapter
//!
//! Thin client over `GET /transactions`. Pagination and pacing live in the
//! collector; this type issues exactly one request per call.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::collector::{FeedPage, FeedQuery, TransferFeed};
use crate::config::FeedConfig;
use crate::error::{IngestError, Result};

#[derive(Clone)]
pub struct WhaleAlertClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl WhaleAlertClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                IngestError::Internal(format!("failed to build Whale Alert HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            config.api_key.clone(),
            config.request_timeout(),
            &config.user_agent,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn query_params(&self, query: &FeedQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("api_key", self.api_key.clone()),
            ("min_value", query.min_value.to_string()),
            ("start", query.start.to_string()),
            ("end", query.end.to_string()),
        ];
        if let Some(cursor) = &query.cursor {
            params.push(("cursor", cursor.clone()));
        }
        params
    }
}

/// Interpret a response body. Non-2xx bodies that still parse as a feed
/// page are returned as pages so the caller sees the feed's own error.
fn decode_response(status: StatusCode, text: &str) -> Result<FeedPage> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(IngestError::RateLimited(format!(
            "Whale Alert rate limited: {}",
            text.trim()
        )));
    }

    match serde_json::from_str::<FeedPage>(text) {
        Ok(page) => Ok(page),
        Err(e) if status.is_success() => Err(IngestError::Json(e)),
        Err(_) => Err(IngestError::Feed {
            status: status.as_u16(),
            body: text.to_string(),
        }),
    }
}

#[async_trait]
impl TransferFeed for WhaleAlertClient {
    async fn fetch_page(&self, query: &FeedQuery) -> Result<FeedPage> {
        let url = format!("{}/transactions", self.base_url);
        debug!(
            "GET {} start={} end={} cursor={:?}",
            url, query.start, query.end, query.cursor
        );

        let resp = self
            .http
            .get(&url)
            .query(&self.query_params(query))
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;

        decode_response(status, &text)
    }
}
