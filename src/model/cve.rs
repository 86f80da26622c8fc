//! Canonical CVE metadata and SecScore response models
//!
//! These are the wire shapes served by the API. Upstream payloads are
//! normalized into these records by the decoders in `upstream/`; the core
//! never observes raw upstream JSON.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Version tag of the scoring model. Cached entries carry this tag and are
/// rewritten on read when it changes.
pub const MODEL_VERSION: &str = "secscore-al-1.2";

static CVE_ID_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Validate and normalize a CVE identifier.
///
/// Returns the uppercased identifier when it matches `CVE-\d{4}-\d{4,}`,
/// `None` otherwise.
pub fn normalize_cve_id(raw: &str) -> Option<String> {
    let pattern =
        CVE_ID_PATTERN.get_or_init(|| Regex::new(r"^CVE-\d{4}-\d{4,}$").expect("valid regex"));
    let candidate = raw.trim().to_uppercase();
    pattern.is_match(&candidate).then_some(candidate)
}

/// Temporal multipliers extracted from a CVSS vector.
///
/// `None` means the metric was absent or unrecognized; scoring treats it
/// as 1.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemporalMultipliers {
    pub remediation_level: Option<f64>,
    pub report_confidence: Option<f64>,
}

/// Normalized NVD record for a single CVE.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CveMetadata {
    pub cve_id: String,
    pub published_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub cvss_base: Option<f64>,
    pub cvss_vector: Option<String>,
    pub cvss_version: Option<String>,
    pub cpe: Vec<String>,
    pub temporal_multipliers: TemporalMultipliers,
    pub model_version: String,
}

impl CveMetadata {
    /// Record used when NVD is unreachable: every nullable field null,
    /// empty CPE set. The score computed from it will typically be 0.
    pub fn defaulted(cve_id: &str) -> Self {
        Self {
            cve_id: cve_id.to_string(),
            published_date: None,
            description: None,
            cvss_base: None,
            cvss_vector: None,
            cvss_version: None,
            cpe: Vec::new(),
            temporal_multipliers: TemporalMultipliers::default(),
            model_version: MODEL_VERSION.to_string(),
        }
    }
}

/// EPSS probability signal for a CVE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EpssSignal {
    /// Probability of exploitation in the next 30 days, in [0, 1].
    pub score: f64,
    /// Percentile rank across all scored CVEs, in [0, 1].
    pub percentile: f64,
    pub fetched_at: DateTime<Utc>,
}

/// A single piece of public exploit evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExploitEvidence {
    /// Evidence origin; currently always `"exploitdb"`.
    pub source: String,
    pub url: Option<String>,
    pub published_date: Option<String>,
}

/// Asymmetric Laplace parameters for one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AlParams {
    pub mu: f64,
    pub lambda: f64,
    pub kappa: f64,
}

/// One entry of the ordered explanation list.
///
/// Consumers must treat this as a tagged sequence, not a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExplanationEntry {
    pub title: String,
    pub detail: String,
    pub source: String,
}

/// Full enrichment response for a CVE.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecScoreResponse {
    pub cve_id: String,
    pub published_date: Option<DateTime<Utc>>,
    pub cvss_base: Option<f64>,
    pub cvss_vector: Option<String>,
    /// Final SecScore in [0, 10], one decimal.
    pub secscore: f64,
    /// AL-CDF output in [0, 1], unrounded.
    pub exploit_prob: f64,
    pub model_category: String,
    pub model_params: AlParams,
    pub epss: Option<EpssSignal>,
    pub exploits: Vec<ExploitEvidence>,
    pub kev: bool,
    pub osv: Option<Vec<crate::model::osv::AffectedPackage>>,
    pub explanation: Vec<ExplanationEntry>,
    pub computed_at: DateTime<Utc>,
    pub model_version: String,
}
