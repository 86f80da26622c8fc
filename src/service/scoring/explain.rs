//! Explanation emission
//!
//! Builds the ordered explanation list for a SecScore response. Entries
//! are a tagged sequence; order is part of the contract.

use crate::model::cve::{AlParams, EpssSignal, ExplanationEntry, ExploitEvidence};
use crate::service::scoring::params::KEV_MIN_FLOOR;
use crate::service::scoring::ScoreBreakdown;

const SOURCE_SECSCORE: &str = "secscore";
const SOURCE_KEV: &str = "cisa-kev";
const SOURCE_EXPLOITDB: &str = "exploitdb";
const SOURCE_EPSS: &str = "epss";
const SOURCE_CVSS: &str = "cvss";

/// Everything the explanation references.
pub struct ExplainContext<'a> {
    pub category: &'a str,
    pub params: AlParams,
    pub breakdown: &'a ScoreBreakdown,
    pub kev: bool,
    pub exploits: &'a [ExploitEvidence],
    pub epss: Option<&'a EpssSignal>,
    pub cvss_base: Option<f64>,
}

/// Build the ordered explanation entries.
pub fn build_explanation(ctx: &ExplainContext) -> Vec<ExplanationEntry> {
    let mut entries = Vec::with_capacity(6);
    let b = ctx.breakdown;

    entries.push(ExplanationEntry {
        title: "Temporal model".to_string(),
        detail: format!(
            "Category '{}' (mu={:.2}, lambda={:.2}, kappa={:.2}): {:.2} weeks since publication, exploit probability {:.3}, maturity {:.3}, kernel {:.1}",
            ctx.category,
            ctx.params.mu,
            ctx.params.lambda,
            ctx.params.kappa,
            b.weeks,
            b.exploit_prob,
            b.exploit_maturity,
            b.temporal_kernel,
        ),
        source: SOURCE_SECSCORE.to_string(),
    });

    if ctx.kev {
        entries.push(ExplanationEntry {
            title: "CISA KEV".to_string(),
            detail: format!(
                "Listed in the CISA Known Exploited Vulnerabilities catalog; minimum score {:.1} enforced",
                KEV_MIN_FLOOR
            ),
            source: SOURCE_KEV.to_string(),
        });
    }

    if let Some(first) = ctx.exploits.first() {
        let detail = match evidence_date(first) {
            Some(date) => format!(
                "Public proof-of-concept exploit available (published {date})"
            ),
            None => "Public proof-of-concept exploit available".to_string(),
        };
        entries.push(ExplanationEntry {
            title: "Exploit PoC".to_string(),
            detail,
            source: SOURCE_EXPLOITDB.to_string(),
        });
    }

    if let Some(epss) = ctx.epss {
        let bonus = b.epss_bonus.unwrap_or(0.0);
        entries.push(ExplanationEntry {
            title: "EPSS".to_string(),
            detail: format!(
                "EPSS score {:.3} (percentile {:.3}) added +{:.2}",
                epss.score, epss.percentile, bonus
            ),
            source: SOURCE_EPSS.to_string(),
        });
    }

    match ctx.cvss_base {
        Some(base) => entries.push(ExplanationEntry {
            title: "CVSS Base".to_string(),
            detail: format!("CVSS base score {:.1} used for kernel", base),
            source: SOURCE_CVSS.to_string(),
        }),
        None => entries.push(ExplanationEntry {
            title: "CVSS Missing".to_string(),
            detail: "No CVSS base score available; temporal kernel defaults to 0".to_string(),
            source: SOURCE_CVSS.to_string(),
        }),
    }

    entries.push(ExplanationEntry {
        title: "SecScore".to_string(),
        detail: format!("Final SecScore {:.1}", b.secscore),
        source: SOURCE_SECSCORE.to_string(),
    });

    entries
}

/// Date portion of the first evidence's publication timestamp.
fn evidence_date(evidence: &ExploitEvidence) -> Option<&str> {
    let raw = evidence.published_date.as_deref()?;
    let date = raw.split('T').next().unwrap_or(raw);
    (!date.is_empty()).then_some(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown() -> ScoreBreakdown {
        ScoreBreakdown {
            secscore: 8.4,
            exploit_prob: 0.444,
            temporal_kernel: 6.3,
            exploit_maturity: 0.95,
            e_min: 0.91,
            weeks: 12.5,
            epss_bonus: Some(1.05),
        }
    }

    fn params() -> AlParams {
        AlParams {
            mu: 4.0,
            lambda: 0.5,
            kappa: 1.2,
        }
    }

    #[test]
    fn full_context_emits_six_entries_in_order() {
        // Scenario S7.
        let exploits = vec![ExploitEvidence {
            source: "exploitdb".to_string(),
            url: None,
            published_date: Some("2024-05-01".to_string()),
        }];
        let epss = EpssSignal {
            score: 0.42,
            percentile: 0.9,
            fetched_at: "2024-06-01T00:00:00Z".parse().unwrap(),
        };

        let b = breakdown();
        let entries = build_explanation(&ExplainContext {
            category: "default",
            params: params(),
            breakdown: &b,
            kev: true,
            exploits: &exploits,
            epss: Some(&epss),
            cvss_base: Some(7.2),
        });

        let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Temporal model",
                "CISA KEV",
                "Exploit PoC",
                "EPSS",
                "CVSS Base",
                "SecScore"
            ]
        );

        assert!(entries[2].detail.contains("2024-05-01"));
        assert!(entries[3].detail.contains("+1.05"));
        assert!(entries[3].detail.contains("0.420"));
        assert!(entries[4].detail.contains("7.2"));
        assert!(entries[5].detail.contains("8.4"));

        let sources: Vec<&str> = entries.iter().map(|e| e.source.as_str()).collect();
        assert_eq!(
            sources,
            vec!["secscore", "cisa-kev", "exploitdb", "epss", "cvss", "secscore"]
        );
    }

    #[test]
    fn bare_context_emits_temporal_cvss_and_final_only() {
        let b = ScoreBreakdown {
            epss_bonus: None,
            ..breakdown()
        };
        let entries = build_explanation(&ExplainContext {
            category: "linux",
            params: params(),
            breakdown: &b,
            kev: false,
            exploits: &[],
            epss: None,
            cvss_base: None,
        });

        let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Temporal model", "CVSS Missing", "SecScore"]);
        assert!(entries[0].detail.contains("'linux'"));
        assert!(entries[1].detail.contains("No CVSS base score"));
    }

    #[test]
    fn exploit_without_date_omits_the_parenthetical() {
        let exploits = vec![ExploitEvidence {
            source: "exploitdb".to_string(),
            url: Some("https://www.exploit-db.com/exploits/1".to_string()),
            published_date: None,
        }];
        let b = breakdown();
        let entries = build_explanation(&ExplainContext {
            category: "default",
            params: params(),
            breakdown: &b,
            kev: false,
            exploits: &exploits,
            epss: None,
            cvss_base: Some(5.0),
        });

        let poc = entries.iter().find(|e| e.title == "Exploit PoC").unwrap();
        assert!(!poc.detail.contains("published"));
    }

    #[test]
    fn timestamped_evidence_dates_are_trimmed_to_day() {
        let evidence = ExploitEvidence {
            source: "exploitdb".to_string(),
            url: None,
            published_date: Some("2024-05-01T12:30:00Z".to_string()),
        };
        assert_eq!(evidence_date(&evidence), Some("2024-05-01"));
    }
}
