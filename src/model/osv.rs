//! OSV.dev API response models
//!
//! Based on the OSV Schema: https://ossf.github.io/osv-schema/
//!
//! The raw shapes mirror the upstream payload; [`normalize_affected`]
//! converts them into the canonical affected-package records served by the
//! API (snake_case `last_affected` becomes camelCase `lastAffected`).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Vulnerability record from OSV.dev, trimmed to the fields we consume.
#[derive(Debug, Clone, Deserialize)]
pub struct OsvVulnerability {
    pub id: String,

    /// Affected packages and versions
    #[serde(default)]
    pub affected: Vec<OsvAffected>,
}

/// Affected package information
#[derive(Debug, Clone, Deserialize)]
pub struct OsvAffected {
    /// Package information (optional - some CVE entries don't have this)
    #[serde(default)]
    pub package: Option<OsvPackage>,

    /// Version ranges affected
    #[serde(default)]
    pub ranges: Vec<OsvRange>,
}

/// Package identifier
#[derive(Debug, Clone, Deserialize)]
pub struct OsvPackage {
    #[serde(default)]
    pub name: Option<String>,

    /// Ecosystem (e.g., "npm", "PyPI", "Maven", "crates.io")
    #[serde(default)]
    pub ecosystem: Option<String>,
}

/// Version range information
#[derive(Debug, Clone, Deserialize)]
pub struct OsvRange {
    /// Type of range (e.g., "SEMVER", "ECOSYSTEM", "GIT")
    #[serde(rename = "type", default)]
    pub range_type: Option<String>,

    /// Events that describe the range
    #[serde(default)]
    pub events: Vec<OsvEvent>,
}

/// Event in a version range
#[derive(Debug, Clone, Deserialize)]
pub struct OsvEvent {
    /// Version where vulnerability was introduced
    #[serde(default)]
    pub introduced: Option<String>,

    /// Version where vulnerability was fixed
    #[serde(default)]
    pub fixed: Option<String>,

    /// Last affected version
    #[serde(default)]
    pub last_affected: Option<String>,

    /// Limit version (exclusive upper bound)
    #[serde(default)]
    pub limit: Option<String>,
}

/// Canonical affected-package record served by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AffectedPackage {
    pub ecosystem: Option<String>,
    pub package: Option<String>,
    pub ranges: Vec<AffectedRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AffectedRange {
    #[serde(rename = "type")]
    pub range_type: Option<String>,
    pub events: Vec<AffectedEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AffectedEvent {
    pub introduced: Option<String>,
    pub fixed: Option<String>,
    pub last_affected: Option<String>,
    pub limit: Option<String>,
}

/// Normalize raw OSV `affected` entries into canonical records.
///
/// Returns `None` when the list is empty.
pub fn normalize_affected(affected: Vec<OsvAffected>) -> Option<Vec<AffectedPackage>> {
    if affected.is_empty() {
        return None;
    }

    let packages = affected
        .into_iter()
        .map(|entry| {
            let (package, ecosystem) = match entry.package {
                Some(pkg) => (pkg.name, pkg.ecosystem),
                None => (None, None),
            };

            AffectedPackage {
                ecosystem,
                package,
                ranges: entry
                    .ranges
                    .into_iter()
                    .map(|range| AffectedRange {
                        range_type: range.range_type,
                        events: range
                            .events
                            .into_iter()
                            .map(|event| AffectedEvent {
                                introduced: event.introduced,
                                fixed: event.fixed,
                                last_affected: event.last_affected,
                                limit: event.limit,
                            })
                            .collect(),
                    })
                    .collect(),
            }
        })
        .collect();

    Some(packages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_affected_normalizes_to_none() {
        assert_eq!(normalize_affected(Vec::new()), None);
    }

    #[test]
    fn snake_case_last_affected_becomes_camel() {
        let raw: OsvVulnerability = serde_json::from_str(
            r#"{
                "id": "CVE-2021-44228",
                "affected": [{
                    "package": {"name": "log4j-core", "ecosystem": "Maven"},
                    "ranges": [{
                        "type": "ECOSYSTEM",
                        "events": [
                            {"introduced": "2.0"},
                            {"last_affected": "2.14.1"}
                        ]
                    }]
                }]
            }"#,
        )
        .unwrap();

        let packages = normalize_affected(raw.affected).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].ecosystem.as_deref(), Some("Maven"));
        assert_eq!(packages[0].package.as_deref(), Some("log4j-core"));

        let json = serde_json::to_value(&packages).unwrap();
        let event = &json[0]["ranges"][0]["events"][1];
        assert_eq!(event["lastAffected"], "2.14.1");
        assert!(event.get("last_affected").is_none());
    }

    #[test]
    fn missing_package_yields_null_fields() {
        let affected = vec![OsvAffected {
            package: None,
            ranges: Vec::new(),
        }];
        let packages = normalize_affected(affected).unwrap();
        assert!(packages[0].ecosystem.is_none());
        assert!(packages[0].package.is_none());
    }
}
