//! Bundled ExploitDB index
//!
//! Loads a bundled JSON array of exploit records once, on first lookup,
//! and serves case-insensitive CVE lookups for the process lifetime. A
//! read failure leaves the index empty and logs a single warning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde_json::Value;

use crate::model::cve::ExploitEvidence;

const EVIDENCE_SOURCE: &str = "exploitdb";

/// Lazily-loaded, read-only index of proof-of-concept exploits by CVE.
pub struct ExploitDbIndex {
    path: PathBuf,
    by_cve: OnceLock<HashMap<String, Vec<ExploitEvidence>>>,
}

impl ExploitDbIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            by_cve: OnceLock::new(),
        }
    }

    /// All exploit evidence recorded for a CVE. Lookup is case-insensitive;
    /// the result may be empty.
    pub fn lookup(&self, cve_id: &str) -> Vec<ExploitEvidence> {
        let index = self.by_cve.get_or_init(|| load_index(&self.path));
        index
            .get(&cve_id.to_uppercase())
            .cloned()
            .unwrap_or_default()
    }
}

fn load_index(path: &Path) -> HashMap<String, Vec<ExploitEvidence>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read ExploitDB index, lookups will be empty");
            return HashMap::new();
        }
    };

    let records: Vec<Value> = match serde_json::from_str(&raw) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to parse ExploitDB index, lookups will be empty");
            return HashMap::new();
        }
    };

    let mut by_cve: HashMap<String, Vec<ExploitEvidence>> = HashMap::new();
    for record in &records {
        // Only records with a string cveId are indexable.
        let Some(cve_id) = record.get("cveId").and_then(Value::as_str) else {
            continue;
        };

        let evidence = ExploitEvidence {
            source: EVIDENCE_SOURCE.to_string(),
            url: record
                .get("url")
                .and_then(Value::as_str)
                .map(str::to_string),
            published_date: record
                .get("publishedDate")
                .and_then(Value::as_str)
                .map(str::to_string),
        };

        by_cve.entry(cve_id.to_uppercase()).or_default().push(evidence);
    }

    tracing::info!(
        path = %path.display(),
        cves = by_cve.len(),
        records = records.len(),
        "Loaded ExploitDB index"
    );

    by_cve
}
