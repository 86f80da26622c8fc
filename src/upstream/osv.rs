//! OSV.dev API client
//!
//! Fetches affected-package data for a CVE. A 404 means OSV has no record
//! and yields `None` silently; other failures yield `None` with a warning.

use std::env;

use super::{build_client, get_json, DEFAULT_TIMEOUT};
use crate::model::osv::{normalize_affected, AffectedPackage, OsvVulnerability};

const OSV_API_BASE_URL: &str = "https://api.osv.dev/v1";
const ENV_OSV_BASE_URL: &str = "SECSCORE_OSV_BASE_URL";

/// Client for the OSV.dev API.
pub struct OsvClient {
    client: reqwest::Client,
    base_url: String,
}

impl OsvClient {
    /// Create a new OSV client. `SECSCORE_OSV_BASE_URL` overrides the
    /// default API endpoint.
    pub fn new() -> Self {
        let base_url =
            env::var(ENV_OSV_BASE_URL).unwrap_or_else(|_| OSV_API_BASE_URL.to_string());
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            base_url: base_url.into(),
        }
    }

    /// Fetch the normalized affected packages for a CVE.
    ///
    /// Returns `None` for 404, empty affected lists, and any upstream
    /// failure.
    pub async fn fetch_affected(&self, cve_id: &str) -> Option<Vec<AffectedPackage>> {
        let url = format!("{}/vulns/{}", self.base_url, cve_id);

        tracing::debug!(cve_id = %cve_id, url = %url, "Fetching affected packages from OSV.dev");

        let vuln: OsvVulnerability = match get_json(&self.client, &url).await {
            Ok(v) => v,
            Err(e) if e.is_not_found() => {
                tracing::debug!(cve_id = %cve_id, "No OSV record");
                return None;
            }
            Err(e) => {
                tracing::warn!(cve_id = %cve_id, error = %e, "OSV fetch failed");
                return None;
            }
        };

        normalize_affected(vuln.affected)
    }
}

impl Default for OsvClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires network access
    async fn fetches_known_cve() {
        let client = OsvClient::new();
        let affected = client.fetch_affected("CVE-2021-44228").await;
        assert!(affected.is_some());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn nonexistent_cve_is_none() {
        let client = OsvClient::new();
        let affected = client.fetch_affected("CVE-9999-99999").await;
        assert!(affected.is_none());
    }
}
