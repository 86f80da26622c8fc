//! NVD (National Vulnerability Database) client and decoder
//!
//! Fetches a single CVE record from the NVD 2.0 REST API and normalizes it
//! into [`CveMetadata`]: CVSS metric selection (v4.0 before v3.1 before
//! v3.0 before v3 before v2), vector-string parsing for the temporal
//! multipliers, and a recursive CPE walk over `configurations`.

use std::collections::BTreeSet;
use std::env;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{build_client, get_json, UpstreamError, DEFAULT_TIMEOUT};
use crate::model::cve::{CveMetadata, TemporalMultipliers, MODEL_VERSION};

const NVD_API_BASE_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";
const ENV_NVD_BASE_URL: &str = "SECSCORE_NVD_BASE_URL";

/// CVSS metric families in selection priority order.
const METRIC_PRIORITY: [&str; 5] = [
    "cvssMetricV40",
    "cvssMetricV31",
    "cvssMetricV30",
    "cvssMetricV3",
    "cvssMetricV2",
];

#[derive(Debug, thiserror::Error)]
pub enum NvdError {
    #[error("CVE not found in NVD: {0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(UpstreamError),
}

/// Client for the NVD 2.0 CVE API.
pub struct NvdClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NvdResponse {
    #[serde(default)]
    vulnerabilities: Vec<NvdItem>,
}

#[derive(Debug, Deserialize)]
struct NvdItem {
    cve: NvdCve,
}

#[derive(Debug, Deserialize)]
struct NvdCve {
    id: String,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    descriptions: Vec<NvdDescription>,
    #[serde(default)]
    metrics: Value,
    #[serde(default)]
    configurations: Value,
}

#[derive(Debug, Deserialize)]
struct NvdDescription {
    #[serde(default)]
    lang: Option<String>,
    value: String,
}

impl NvdClient {
    /// Create a new NVD client. `SECSCORE_NVD_BASE_URL` overrides the
    /// default API endpoint.
    pub fn new() -> Self {
        let base_url =
            env::var(ENV_NVD_BASE_URL).unwrap_or_else(|_| NVD_API_BASE_URL.to_string());
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            base_url: base_url.into(),
        }
    }

    /// Fetch and normalize the NVD record for a CVE.
    ///
    /// Picks the vulnerability whose inner `id` matches the request
    /// (case-sensitive) or the first entry. An empty result set is a
    /// [`NvdError::NotFound`].
    pub async fn fetch_metadata(&self, cve_id: &str) -> Result<CveMetadata, NvdError> {
        let url = format!("{}?cveId={}", self.base_url, cve_id);

        tracing::debug!(cve_id = %cve_id, url = %url, "Fetching CVE record from NVD");

        let response: NvdResponse = get_json(&self.client, &url).await.map_err(|e| {
            if e.is_not_found() {
                NvdError::NotFound(cve_id.to_string())
            } else {
                NvdError::Upstream(e)
            }
        })?;

        let mut items = response.vulnerabilities;
        if items.is_empty() {
            return Err(NvdError::NotFound(cve_id.to_string()));
        }

        let index = items
            .iter()
            .position(|item| item.cve.id == cve_id)
            .unwrap_or(0);
        let cve = items.swap_remove(index).cve;

        Ok(decode_cve(cve_id, cve))
    }

    /// Like [`fetch_metadata`], but degrades non-404 failures into a
    /// defaulted record with a warning, per the partial-failure policy.
    ///
    /// [`fetch_metadata`]: NvdClient::fetch_metadata
    pub async fn fetch_or_default(&self, cve_id: &str) -> Result<CveMetadata, NvdError> {
        match self.fetch_metadata(cve_id).await {
            Ok(meta) => Ok(meta),
            Err(NvdError::NotFound(id)) => Err(NvdError::NotFound(id)),
            Err(NvdError::Upstream(e)) => {
                tracing::warn!(cve_id = %cve_id, error = %e, "NVD fetch failed, using defaulted metadata");
                Ok(CveMetadata::defaulted(cve_id))
            }
        }
    }
}

impl Default for NvdClient {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_cve(cve_id: &str, cve: NvdCve) -> CveMetadata {
    let description = pick_description(&cve.descriptions);
    let published_date = cve.published.as_deref().and_then(parse_nvd_timestamp);

    let (cvss_base, cvss_vector, cvss_version) = select_cvss_metric(&cve.metrics);
    let temporal_multipliers = cvss_vector
        .as_deref()
        .map(temporal_from_vector)
        .unwrap_or_default();

    let cpe = collect_cpe(&cve.configurations);

    CveMetadata {
        cve_id: cve_id.to_string(),
        published_date,
        description,
        cvss_base,
        cvss_vector,
        cvss_version,
        cpe,
        temporal_multipliers,
        model_version: MODEL_VERSION.to_string(),
    }
}

fn pick_description(descriptions: &[NvdDescription]) -> Option<String> {
    descriptions
        .iter()
        .find(|d| d.lang.as_deref() == Some("en"))
        .or_else(|| descriptions.first())
        .map(|d| d.value.clone())
}

/// NVD timestamps come without a timezone suffix ("2021-12-10T10:15:09.143");
/// treat them as UTC. RFC 3339 inputs are accepted too.
fn parse_nvd_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Select the highest-priority CVSS metric and read base score, vector and
/// version out of it.
fn select_cvss_metric(metrics: &Value) -> (Option<f64>, Option<String>, Option<String>) {
    for family in METRIC_PRIORITY {
        let Some(entries) = metrics.get(family).and_then(Value::as_array) else {
            continue;
        };
        let Some(entry) = entries.first() else {
            continue;
        };

        let cvss_data = entry.get("cvssData").unwrap_or(entry);

        let base = cvss_data
            .get("baseScore")
            .and_then(Value::as_f64)
            .or_else(|| cvss_data.get("score").and_then(Value::as_f64));
        let vector = cvss_data
            .get("vectorString")
            .and_then(Value::as_str)
            .map(str::to_string);
        let version = cvss_data
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| vector.as_deref().and_then(vector_version));

        return (base, vector, version);
    }

    (None, None, None)
}

/// Version segment of a CVSS vector ("CVSS:3.1/AV:N/..." yields "3.1").
fn vector_version(vector: &str) -> Option<String> {
    vector
        .split('/')
        .next()?
        .strip_prefix("CVSS:")
        .map(str::to_string)
}

/// Extract the temporal multipliers from a CVSS vector string.
fn temporal_from_vector(vector: &str) -> TemporalMultipliers {
    let mut temporal = TemporalMultipliers::default();

    for segment in vector.split('/').skip(1) {
        let Some((key, code)) = segment.split_once(':') else {
            continue;
        };
        match key {
            "RL" => temporal.remediation_level = remediation_level(code),
            "RC" => temporal.report_confidence = report_confidence(code),
            _ => {}
        }
    }

    temporal
}

/// Remediation Level multiplier. Unknown codes map to `None` and are
/// treated as 1 downstream.
fn remediation_level(code: &str) -> Option<f64> {
    match code.to_uppercase().as_str() {
        "X" | "NOT_DEFINED" => Some(1.0),
        "U" | "UNAVAILABLE" => Some(1.0),
        "W" | "WORKAROUND" => Some(0.97),
        "T" | "TEMPORARY" => Some(0.96),
        "O" | "OFFICIAL" => Some(0.95),
        _ => None,
    }
}

/// Report Confidence multiplier.
fn report_confidence(code: &str) -> Option<f64> {
    match code.to_uppercase().as_str() {
        "X" | "NOT_DEFINED" => Some(1.0),
        "C" | "CONFIRMED" => Some(1.0),
        "R" | "REASONABLE" => Some(0.96),
        "U" | "UNKNOWN" => Some(0.92),
        _ => None,
    }
}

/// Recursively walk `configurations`, collecting every `cpeMatch.criteria`
/// string into a deduplicated, ordered set.
fn collect_cpe(configurations: &Value) -> Vec<String> {
    let mut set = BTreeSet::new();
    walk_cpe(configurations, &mut set);
    set.into_iter().collect()
}

fn walk_cpe(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(matches) = map.get("cpeMatch").and_then(Value::as_array) {
                for entry in matches {
                    if let Some(criteria) = entry.get("criteria").and_then(Value::as_str) {
                        out.insert(criteria.to_string());
                    }
                }
            }
            for child in map.values() {
                walk_cpe(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                walk_cpe(child, out);
            }
        }
        _ => {}
    }
}
