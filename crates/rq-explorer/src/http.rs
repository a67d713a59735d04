//! # HTTP Backend
//!
//! [`SearchBackend`] over the query service's JSON API:
//! `POST {base}/search/query`, `/search/aggregate`, `/search/timeline`,
//! with an optional bearer key. Index stats (`GET /search/stats/{case}`)
//! are not part of the explorer loop and live on [`HttpBackend`] itself.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use rq_core::wire::{
    AggregateRequest, AggregateResponse, IndexStats, SearchRequest, SearchResponse,
    TimelineRequest, TimelineResponse,
};

use crate::backend::SearchBackend;
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Document count and store size of a case's index.
    pub async fn stats(&self, case_id: &str) -> Result<IndexStats, FetchError> {
        self.get_request(&format!("stats/{}", case_id)).await
    }

    async fn post_request<B, T>(&self, endpoint: &str, body: &B) -> Result<T, FetchError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/search/{}", self.base_url, endpoint);
        let req = self.client.post(&url).json(body);
        self.send(req, "POST", &url).await
    }

    async fn get_request<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, FetchError> {
        let url = format!("{}/search/{}", self.base_url, endpoint);
        let req = self.client.get(&url);
        self.send(req, "GET", &url).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        mut req: reqwest::RequestBuilder,
        method: &str,
        url: &str,
    ) -> Result<T, FetchError> {
        if let Some(k) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", k));
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            tracing::debug!("{} {} -> {}", method, url, status);
            return Err(FetchError::Backend {
                status: status.as_u16(),
                message: error_message(&text, status),
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// The service reports failures as `{"detail": ...}`; anything else is
/// passed through as-is.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(s)) => return s.clone(),
            Some(other) => return other.to_string(),
            None => {}
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait::async_trait]
impl SearchBackend for HttpBackend {
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse, FetchError> {
        self.post_request("query", &request).await
    }

    async fn aggregate(
        &self,
        request: AggregateRequest,
    ) -> Result<AggregateResponse, FetchError> {
        self.post_request("aggregate", &request).await
    }

    async fn timeline(&self, request: TimelineRequest) -> Result<TimelineResponse, FetchError> {
        self.post_request("timeline", &request).await
    }
}
