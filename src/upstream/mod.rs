//! Upstream HTTP clients for the public threat-signal sources
//!
//! All fetchers share one transport policy: JSON only, explicit
//! user-agent, bounded per-request timeout, and a small number of retries
//! with uniform jitter between attempts. "Not found" responses bubble up
//! immediately without retrying.

mod epss;
mod kev_feed;
mod nvd;
mod osv;

use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;

pub use epss::EpssClient;
pub use kev_feed::{KevFeedClient, KevFeedResponse};
pub use nvd::NvdClient;
pub use osv::OsvClient;

/// User-agent sent on every upstream request.
pub const USER_AGENT: &str = concat!("secscore-intel/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout for the per-CVE fetchers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Additional attempts after the first failure.
const MAX_RETRIES: u32 = 2;

const JITTER_MIN_MS: u64 = 200;
const JITTER_MAX_MS: u64 = 400;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl UpstreamError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::NotFound(_))
    }
}

/// Build a reqwest client with the shared transport defaults.
pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .expect("failed to build HTTP client")
}

/// GET a JSON document with the shared retry policy.
///
/// Any failure is retried up to [`MAX_RETRIES`] times with uniform
/// 200-400ms jitter between attempts, except a 404 which returns
/// immediately.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, UpstreamError> {
    let mut last_err: Option<UpstreamError> = None;

    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            tokio::time::sleep(jitter()).await;
            tracing::debug!(url = %url, attempt = attempt, "Retrying upstream request");
        }

        match try_get_json(client, url).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_not_found() => return Err(err),
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err.expect("at least one attempt"))
}

async fn try_get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, UpstreamError> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(UpstreamError::NotFound(url.to_string()));
    }

    if !response.status().is_success() {
        return Err(UpstreamError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    response.json().await.map_err(|e| UpstreamError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn jitter() -> Duration {
    let ms = rand::thread_rng().gen_range(JITTER_MIN_MS..=JITTER_MAX_MS);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_in_bounds() {
        for _ in 0..100 {
            let d = jitter();
            assert!(d >= Duration::from_millis(JITTER_MIN_MS));
            assert!(d <= Duration::from_millis(JITTER_MAX_MS));
        }
    }

    #[test]
    fn not_found_is_classified() {
        let err = UpstreamError::NotFound("https://example.test/x".to_string());
        assert!(err.is_not_found());

        let err = UpstreamError::Status {
            status: 500,
            url: "https://example.test/x".to_string(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn user_agent_carries_crate_version() {
        assert!(USER_AGENT.starts_with("secscore-intel/"));
    }
}
