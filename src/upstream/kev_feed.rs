//! CISA KEV feed client
//!
//! Performs a single conditional GET of the KEV catalog. The caller (the
//! KEV store) supplies the caching headers from the current snapshot; a
//! 304 comes back as [`KevFeedResponse::NotModified`] without touching the
//! body.

use std::env;
use std::time::Duration;

use super::{build_client, UpstreamError};
use crate::model::kev::{KevEntry, KevPayload};

/// URL for the CISA KEV JSON feed.
const KEV_FEED_URL: &str =
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json";
const ENV_KEV_FEED_URL: &str = "SECSCORE_KEV_FEED_URL";

/// The feed is a full-catalog download; give it a longer deadline than the
/// per-CVE fetchers.
const FEED_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a conditional feed fetch.
#[derive(Debug)]
pub enum KevFeedResponse {
    /// Upstream returned 304; the current snapshot is still fresh.
    NotModified,
    Fetched {
        entries: Vec<KevEntry>,
        etag: Option<String>,
        last_modified: Option<String>,
    },
}

/// Client for the CISA KEV feed.
pub struct KevFeedClient {
    client: reqwest::Client,
    feed_url: String,
}

impl KevFeedClient {
    /// Create a new feed client. `SECSCORE_KEV_FEED_URL` overrides the
    /// default feed location.
    pub fn new() -> Self {
        let feed_url = env::var(ENV_KEV_FEED_URL).unwrap_or_else(|_| KEV_FEED_URL.to_string());
        Self::with_feed_url(feed_url)
    }

    pub fn with_feed_url(feed_url: impl Into<String>) -> Self {
        Self {
            client: build_client(FEED_TIMEOUT),
            feed_url: feed_url.into(),
        }
    }

    /// Conditionally GET the feed.
    ///
    /// `etag` becomes `If-None-Match` and `last_modified` becomes
    /// `If-Modified-Since` when present. Accepts both the upstream verbose
    /// shape and our compact shape.
    pub async fn fetch(
        &self,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<KevFeedResponse, UpstreamError> {
        let mut request = self
            .client
            .get(&self.feed_url)
            .header("Accept", "application/json");

        if let Some(etag) = etag {
            request = request.header("If-None-Match", etag);
        }
        if let Some(last_modified) = last_modified {
            request = request.header("If-Modified-Since", last_modified);
        }

        tracing::debug!(url = %self.feed_url, "Fetching KEV feed");

        let response = request.send().await?;

        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(KevFeedResponse::NotModified);
        }

        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                status: response.status().as_u16(),
                url: self.feed_url.clone(),
            });
        }

        let new_etag = header_value(&response, "etag");
        let new_last_modified = header_value(&response, "last-modified");

        let payload: KevPayload =
            response.json().await.map_err(|e| UpstreamError::Decode {
                url: self.feed_url.clone(),
                message: e.to_string(),
            })?;

        Ok(KevFeedResponse::Fetched {
            entries: payload.into_entries(),
            etag: new_etag,
            last_modified: new_last_modified,
        })
    }
}

impl Default for KevFeedClient {
    fn default() -> Self {
        Self::new()
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
