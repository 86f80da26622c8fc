//! CISA Known Exploited Vulnerabilities (KEV) catalog models
//!
//! Two payload shapes exist: the upstream verbose feed
//! (`{"vulnerabilities": [{"cveID": ...}]}`) and our compact snapshot
//! (`{"items": [...]}`) persisted to disk. Both normalize into
//! [`KevEntry`] records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A single KEV entry. Blank string fields are trimmed to absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KevEntry {
    pub cve_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
}

impl KevEntry {
    /// Trim blank string fields to absent.
    pub fn trimmed(self) -> Self {
        Self {
            cve_id: self.cve_id,
            date_added: non_blank(self.date_added),
            vendor_project: non_blank(self.vendor_project),
            product: non_blank(self.product),
        }
    }
}

/// Compact snapshot schema persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KevFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<KevEntry>,
}

/// Upstream verbose feed shape.
///
/// `vulnerabilities` is required so the untagged [`KevPayload`] decode
/// cannot mistake a compact payload for this shape.
#[derive(Debug, Clone, Deserialize)]
pub struct KevFeed {
    pub vulnerabilities: Vec<KevFeedEntry>,
}

/// One vulnerability in the upstream feed. Fields we do not index are
/// ignored by serde.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KevFeedEntry {
    #[serde(rename = "cveID")]
    pub cve_id: String,
    #[serde(default)]
    pub date_added: Option<String>,
    #[serde(default)]
    pub vendor_project: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
}

impl From<KevFeedEntry> for KevEntry {
    fn from(entry: KevFeedEntry) -> Self {
        KevEntry {
            cve_id: entry.cve_id,
            date_added: entry.date_added,
            vendor_project: entry.vendor_project,
            product: entry.product,
        }
        .trimmed()
    }
}

/// Either payload shape the refresh endpoint may encounter.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KevPayload {
    Verbose(KevFeed),
    Compact { items: Vec<KevEntry> },
}

impl KevPayload {
    /// Normalize into deduplicated, trimmed entries. First occurrence of a
    /// CVE id wins.
    pub fn into_entries(self) -> Vec<KevEntry> {
        let raw: Vec<KevEntry> = match self {
            KevPayload::Verbose(feed) => {
                feed.vulnerabilities.into_iter().map(KevEntry::from).collect()
            }
            KevPayload::Compact { items } => {
                items.into_iter().map(KevEntry::trimmed).collect()
            }
        };

        let mut seen = std::collections::HashSet::new();
        raw.into_iter()
            .filter(|entry| !entry.cve_id.is_empty() && seen.insert(entry.cve_id.clone()))
            .collect()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
