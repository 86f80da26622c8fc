//! FIRST EPSS (Exploit Prediction Scoring System) client
//!
//! The EPSS API returns scores as strings; both fields must parse to
//! finite floats or the signal is treated as absent. Any upstream failure
//! degrades to `None`.

use std::env;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{build_client, get_json, DEFAULT_TIMEOUT};
use crate::model::cve::EpssSignal;

const EPSS_API_BASE_URL: &str = "https://api.first.org/data/v1/epss";
const ENV_EPSS_BASE_URL: &str = "SECSCORE_EPSS_BASE_URL";

/// Client for the FIRST EPSS API.
pub struct EpssClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EpssResponse {
    #[serde(default)]
    data: Vec<EpssRecord>,
}

#[derive(Debug, Deserialize)]
struct EpssRecord {
    #[serde(default)]
    cve: Option<String>,
    #[serde(default)]
    epss: Option<String>,
    #[serde(default)]
    percentile: Option<String>,
}

impl EpssClient {
    /// Create a new EPSS client. `SECSCORE_EPSS_BASE_URL` overrides the
    /// default API endpoint.
    pub fn new() -> Self {
        let base_url =
            env::var(ENV_EPSS_BASE_URL).unwrap_or_else(|_| EPSS_API_BASE_URL.to_string());
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            base_url: base_url.into(),
        }
    }

    /// Fetch the EPSS signal for a CVE. Absent records, unparsable floats
    /// and upstream errors all yield `None`.
    pub async fn fetch_signal(&self, cve_id: &str, now: DateTime<Utc>) -> Option<EpssSignal> {
        let url = format!("{}?cve={}", self.base_url, cve_id);

        tracing::debug!(cve_id = %cve_id, url = %url, "Fetching EPSS score");

        let response: EpssResponse = match get_json(&self.client, &url).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(cve_id = %cve_id, error = %e, "EPSS fetch failed");
                return None;
            }
        };

        let record = response
            .data
            .into_iter()
            .find(|r| r.cve.as_deref() == Some(cve_id))?;

        let score = parse_probability(record.epss.as_deref())?;
        let percentile = parse_probability(record.percentile.as_deref())?;

        Some(EpssSignal {
            score,
            percentile,
            fetched_at: now,
        })
    }
}

impl Default for EpssClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_probability(raw: Option<&str>) -> Option<f64> {
    let value: f64 = raw?.parse().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_floats() {
        assert_eq!(parse_probability(Some("0.97565")), Some(0.97565));
        assert_eq!(parse_probability(Some("0")), Some(0.0));
    }

    #[test]
    fn rejects_absent_and_nan() {
        assert_eq!(parse_probability(None), None);
        assert_eq!(parse_probability(Some("NaN")), None);
        assert_eq!(parse_probability(Some("not-a-number")), None);
        assert_eq!(parse_probability(Some("")), None);
    }

    #[test]
    fn decodes_epss_payload() {
        let response: EpssResponse = serde_json::from_str(
            r#"{
                "status": "OK",
                "data": [
                    {"cve": "CVE-2021-44228", "epss": "0.97565", "percentile": "0.99988", "date": "2024-05-01"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].cve.as_deref(), Some("CVE-2021-44228"));
        assert_eq!(response.data[0].epss.as_deref(), Some("0.97565"));
    }
}
