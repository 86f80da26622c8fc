//! Model parameters and category inference
//!
//! Tunables for the SecScore blend plus the per-category Asymmetric
//! Laplace parameter table. The table ships bundled and can be overridden
//! by a JSON file keyed by category tag; `default` is mandatory.

use std::collections::HashMap;
use std::path::Path;

use crate::model::cve::AlParams;

/// Minimum score for CVEs listed in the CISA KEV catalog.
pub const KEV_MIN_FLOOR: f64 = 8.0;

/// Additive bonus when public proof-of-concept evidence exists.
pub const POC_BONUS_MAX: f64 = 1.0;

/// Weight applied to the raw EPSS probability before adding it in.
pub const EPSS_BLEND_WEIGHT: f64 = 2.5;

/// Exploit-maturity floor for CVSS v2/v3 vectors.
pub const DEFAULT_E_MIN: f64 = 0.91;

/// Exploit-maturity ceiling.
pub const E_MAX: f64 = 1.0;

// Assumed CVSS v4 exploit-maturity values. The v4 floor is the fixed
// Unreported/Attacked ratio, not the v4 specification's E metric.
const V4_MATURITY_ATTACKED: f64 = 1.0;
const V4_MATURITY_UNREPORTED: f64 = 0.9;

/// Exploit-maturity floor for a CVSS version string.
pub fn e_min_for_version(cvss_version: Option<&str>) -> f64 {
    match cvss_version {
        Some(v) if v.starts_with('4') => {
            (V4_MATURITY_UNREPORTED / V4_MATURITY_ATTACKED).clamp(0.0, 1.0)
        }
        _ => DEFAULT_E_MIN,
    }
}

/// Category tag used when nothing more specific matches.
pub const DEFAULT_CATEGORY: &str = "default";

/// Substring rules in priority order; the first matching rule wins.
/// Re-ordering changes results, so any edit needs the regression cases
/// below updated with it.
const CATEGORY_RULES: &[(&str, &[&str])] = &[
    ("php", &["php"]),
    ("webapps", &["wordpress", "joomla"]),
    ("windows", &["microsoft", "windows"]),
    ("linux", &["linux", "kernel"]),
    ("android", &["android", "google:android"]),
    ("ios", &["apple:iphone_os", "ios"]),
    ("macos", &["apple:mac_os_x", "macos"]),
    ("java", &["oracle:java", ":java", "openjdk", "jdk"]),
    ("dos", &["denial_of_service", ":dos", "/dos"]),
    ("asp", &["asp.net", "aspnet"]),
    ("hardware", &[":h:", "firmware", "hardware"]),
    ("remote", &["remote"]),
    ("local", &["local"]),
];

/// Infer the model category from a CPE set.
///
/// Case-insensitive substring tests, evaluated in priority order; empty
/// input yields `default`.
pub fn infer_category(cpes: &[String]) -> &'static str {
    let lowered: Vec<String> = cpes.iter().map(|c| c.to_lowercase()).collect();

    for (category, patterns) in CATEGORY_RULES {
        let hit = lowered
            .iter()
            .any(|cpe| patterns.iter().any(|pattern| cpe.contains(pattern)));
        if hit {
            return category;
        }
    }

    DEFAULT_CATEGORY
}

const BUNDLED_PARAMS: &str = include_str!("../../../data/al-params.json");

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("Failed to parse AL parameter table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("AL parameter table is missing the mandatory 'default' entry")]
    MissingDefault,
}

/// Per-category Asymmetric Laplace parameter table.
pub struct ModelParamsTable {
    map: HashMap<String, AlParams>,
}

impl ModelParamsTable {
    /// Load the table from `path`, falling back to the bundled parameters
    /// when the file is absent or unreadable.
    pub fn load(path: &Path) -> Result<Self, ParamsError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "Loaded AL parameter table");
                contents
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "AL parameter file not readable, using bundled table");
                BUNDLED_PARAMS.to_string()
            }
        };
        Self::from_json(&raw)
    }

    /// Parse a table from JSON. `default` must be present.
    pub fn from_json(raw: &str) -> Result<Self, ParamsError> {
        let map: HashMap<String, AlParams> = serde_json::from_str(raw)?;
        if !map.contains_key(DEFAULT_CATEGORY) {
            return Err(ParamsError::MissingDefault);
        }
        Ok(Self { map })
    }

    pub fn bundled() -> Self {
        Self::from_json(BUNDLED_PARAMS).expect("bundled AL parameter table is valid")
    }

    /// Parameters for a category, falling back to `default`.
    pub fn get(&self, category: &str) -> AlParams {
        self.map
            .get(category)
            .or_else(|| self.map.get(DEFAULT_CATEGORY))
            .copied()
            .expect("default entry validated at load")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpes(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_cpe_list_is_default() {
        assert_eq!(infer_category(&[]), "default");
    }

    #[test]
    fn php_wins_over_windows_by_priority() {
        // Scenario S4 from the regression corpus.
        let category = infer_category(&cpes(&[
            "cpe:/o:microsoft:windows_server:2022",
            "cpe:/a:php:php:8.2",
        ]));
        assert_eq!(category, "php");
    }

    #[test]
    fn inference_is_case_insensitive() {
        assert_eq!(infer_category(&cpes(&["CPE:/A:PHP:PHP:8.2"])), "php");
        assert_eq!(
            infer_category(&cpes(&["cpe:/o:Microsoft:Windows_10"])),
            "windows"
        );
    }

    #[test]
    fn category_priority_order() {
        let cases: &[(&[&str], &str)] = &[
            (&["cpe:/a:wordpress:wordpress:6.0"], "webapps"),
            (&["cpe:/o:linux:linux_kernel:5.15"], "linux"),
            (&["cpe:/o:google:android:13"], "android"),
            (&["cpe:/o:apple:iphone_os:16"], "ios"),
            (&["cpe:/o:apple:mac_os_x:12"], "macos"),
            (&["cpe:/a:oracle:java:17"], "java"),
            (&["cpe:/a:openjdk:jdk:21"], "java"),
            (&["cpe:/a:foo:denial_of_service_tool:1"], "dos"),
            (&["cpe:/a:microsoft_clone:aspnet:4"], "asp"),
            (&["cpe:2.3:h:cisco:router:-"], "hardware"),
            (&["cpe:/a:vendor:firmware_updater:1"], "hardware"),
            (&["cpe:/a:acme:remote_desktop:2"], "remote"),
            (&["cpe:/a:acme:local_agent:2"], "local"),
            (&["cpe:/a:acme:widget:1"], "default"),
        ];

        for (input, expected) in cases {
            assert_eq!(infer_category(&cpes(input)), *expected, "cpes: {input:?}");
        }
    }

    #[test]
    fn bundled_table_has_all_categories() {
        let table = ModelParamsTable::bundled();
        for category in [
            "default", "php", "webapps", "windows", "linux", "android", "ios", "macos", "java",
            "dos", "asp", "hardware", "remote", "local",
        ] {
            let params = table.get(category);
            assert!(params.mu.is_finite());
            assert!(params.lambda > 0.0);
            assert!(params.kappa > 0.0);
        }
    }

    #[test]
    fn unknown_category_falls_back_to_default() {
        let table = ModelParamsTable::bundled();
        assert_eq!(table.get("no-such-category"), table.get("default"));
    }

    #[test]
    fn missing_default_entry_is_rejected() {
        let result = ModelParamsTable::from_json(
            r#"{"php": {"mu": 2.5, "lambda": 0.6, "kappa": 1.1}}"#,
        );
        assert!(matches!(result, Err(ParamsError::MissingDefault)));
    }

    #[test]
    fn v4_e_min_uses_assumed_maturity_ratio() {
        assert_eq!(e_min_for_version(Some("4.0")), 0.9);
        assert_eq!(e_min_for_version(Some("3.1")), DEFAULT_E_MIN);
        assert_eq!(e_min_for_version(Some("2.0")), DEFAULT_E_MIN);
        assert_eq!(e_min_for_version(None), DEFAULT_E_MIN);
    }
}
