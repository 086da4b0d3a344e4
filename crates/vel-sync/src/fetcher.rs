//! # Remote Update Fetcher
//!
//! Retrieves records changed since a checkpoint from the content backend.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  fetch_since("banners", 1700000000000)                                 │
//! │     GET {base}/api/sync/check?collection=banners&since=1700000000000   │
//! │     200 → JSON array of records                                        │
//! │                                                                         │
//! │  fetch_one("wallpapers", "w-42")                                       │
//! │     GET {base}/api/sync/item/wallpapers/w-42                           │
//! │     200 → one record    404 → None                                     │
//! │                                                                         │
//! │  Headers on every request:                                             │
//! │     X-Client-Id: <client id>                                           │
//! │     Authorization: Bearer <api key>     (when configured)              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Errors are returned, not swallowed; the orchestrator decides that a failed
//! fetch means "no updates this cycle" and keeps the checkpoint where it was.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;
use vel_core::Record;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

/// Source of remote record updates.
///
/// [`HttpFetcher`] talks to the content backend; tests plug in scripted
/// fetchers.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Records of `collection` changed after `since_ms` (epoch millis),
    /// tombstones included.
    async fn fetch_since(&self, collection: &str, since_ms: i64) -> SyncResult<Vec<Record>>;

    /// Current state of one record, `None` if the backend does not know it.
    async fn fetch_one(&self, collection: &str, id: &str) -> SyncResult<Option<Record>>;
}

/// [`RemoteFetcher`] over the backend's HTTP sync API.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
}

impl HttpFetcher {
    /// Creates a fetcher for `base_url`.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let fetcher = HttpFetcher::new("https://content.example.org", "client-1", None)?;
    /// ```
    pub fn new(base_url: &str, client_id: &str, api_key: Option<&str>) -> SyncResult<Self> {
        Self::with_timeouts(
            base_url,
            client_id,
            api_key,
            Duration::from_secs(10),
            Duration::from_secs(30),
        )
    }

    /// Creates a fetcher with explicit connect and request timeouts.
    pub fn with_timeouts(
        base_url: &str,
        client_id: &str,
        api_key: Option<&str>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> SyncResult<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl(base_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-client-id",
            HeaderValue::from_str(client_id)
                .map_err(|e| SyncError::InvalidConfig(format!("client id: {e}")))?,
        );
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| SyncError::InvalidConfig(format!("api key: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;

        debug!(base_url = %base_url, "HTTP fetcher created");

        Ok(HttpFetcher { client, base_url })
    }

    /// Creates a fetcher from the `[client]` and `[remote]` config sections.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::with_timeouts(
            &config.remote.base_url,
            &config.client.id,
            config.remote.api_key.as_deref(),
            Duration::from_secs(config.remote.connect_timeout_secs),
            Duration::from_secs(config.remote.request_timeout_secs),
        )
    }

    /// Base URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends path segments (percent-encoded) to the base URL.
    fn endpoint(&self, segments: &[&str]) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch_since(&self, collection: &str, since_ms: i64) -> SyncResult<Vec<Record>> {
        let url = self.endpoint(&["api", "sync", "check"])?;

        let response = self
            .client
            .get(url)
            .query(&[("collection", collection.to_string()), ("since", since_ms.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let records: Vec<Record> = response.json().await?;

        debug!(collection = %collection, since = since_ms, fetched = records.len(), "Fetched updates");
        Ok(records)
    }

    async fn fetch_one(&self, collection: &str, id: &str) -> SyncResult<Option<Record>> {
        let url = self.endpoint(&["api", "sync", "item", collection, id])?;

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(collection = %collection, id = %id, "Item not found on backend");
            return Ok(None);
        }

        let record: Record = response.error_for_status()?.json().await?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_building() {
        let fetcher = HttpFetcher::new("https://content.example.org/base/", "c1", None).unwrap();

        let url = fetcher.endpoint(&["api", "sync", "item", "ai_chats", "a b/c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://content.example.org/base/api/sync/item/ai_chats/a%20b%2Fc"
        );

        let fetcher = HttpFetcher::new("http://localhost:3000", "c1", None).unwrap();
        let url = fetcher.endpoint(&["api", "sync", "check"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/sync/check");
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(HttpFetcher::new("not a url", "c1", None).is_err());
        assert!(HttpFetcher::new("mailto:someone@example.org", "c1", None).is_err());
        assert!(HttpFetcher::new("http://localhost", "bad\nid", None)
            .unwrap_err()
            .is_config_error());
    }

    #[test]
    fn test_from_config() {
        let config = SyncConfig::default();
        let fetcher = HttpFetcher::from_config(&config).unwrap();
        assert_eq!(fetcher.base_url().as_str(), "http://localhost:3000/");
    }
}
