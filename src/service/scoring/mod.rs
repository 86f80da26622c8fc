//! SecScore computation engine
//!
//! Blends an Asymmetric Laplace CDF over weeks-since-publication with the
//! CVSS base score, temporal multipliers, EPSS weighting, a
//! proof-of-concept bonus and the KEV floor. All functions are pure; the
//! wall clock comes in through the inputs.

pub mod explain;
pub mod params;

use chrono::{DateTime, Utc};

use crate::model::cve::{AlParams, TemporalMultipliers};

const WEEK_MS: f64 = 7.0 * 86_400.0 * 1000.0;

/// Exponent arguments outside this range are saturated; at or below the
/// lower bound the term contributes 0.
const EXP_BOUND: f64 = 50.0;

/// Asymmetric Laplace CDF at `weeks` for parameters (mu, lambda, kappa).
///
/// Negative inputs clamp to 0; any non-finite argument yields 0; the
/// result is clamped to [0, 1].
pub fn asymmetric_laplace_cdf(weeks: f64, mu: f64, lambda: f64, kappa: f64) -> f64 {
    if !weeks.is_finite() || !mu.is_finite() || !lambda.is_finite() || !kappa.is_finite() {
        return 0.0;
    }

    let t = weeks.max(0.0);
    let kappa_sq = kappa * kappa;

    let value = if t <= mu {
        (kappa_sq / (1.0 + kappa_sq)) * bounded_exp((lambda / kappa) * (t - mu))
    } else {
        1.0 - (1.0 / (1.0 + kappa_sq)) * bounded_exp(-lambda * kappa * (t - mu))
    };

    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

fn bounded_exp(x: f64) -> f64 {
    if x <= -EXP_BOUND {
        return 0.0;
    }
    x.min(EXP_BOUND).exp()
}

/// Round to one decimal, half away from zero, with an epsilon bias so
/// binary-float artifacts like 6.8449999999 do not flip the result.
pub fn round1(x: f64) -> f64 {
    let scaled = x * 10.0;
    let biased = scaled + scaled.signum() * f64::EPSILON * scaled.abs();
    biased.round() / 10.0
}

/// Weeks elapsed between publication and `now`, clamped to 0. Missing
/// publication dates count as 0 weeks.
pub fn weeks_since(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match published {
        Some(published) => ((now - published).num_milliseconds() as f64 / WEEK_MS).max(0.0),
        None => 0.0,
    }
}

/// Everything the score blend consumes.
#[derive(Debug, Clone)]
pub struct ScoreInputs<'a> {
    pub cvss_base: Option<f64>,
    pub cvss_version: Option<&'a str>,
    pub temporal: TemporalMultipliers,
    pub published_date: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
    pub params: AlParams,
    pub epss_score: Option<f64>,
    pub has_exploit: bool,
    pub kev: bool,
}

/// Intermediate and final values of one score computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    /// Final SecScore in [0, 10], one decimal.
    pub secscore: f64,
    /// AL-CDF output, unrounded.
    pub exploit_prob: f64,
    /// CVSS base scaled by the temporal multipliers, one decimal.
    pub temporal_kernel: f64,
    /// Time-aware scalar in [e_min, 1].
    pub exploit_maturity: f64,
    pub e_min: f64,
    pub weeks: f64,
    /// EPSS contribution actually added, when EPSS was present.
    pub epss_bonus: Option<f64>,
}

/// Compute the SecScore blend.
pub fn compute_sec_score(inputs: &ScoreInputs) -> ScoreBreakdown {
    let base = inputs.cvss_base.filter(|b| b.is_finite()).unwrap_or(0.0);
    let rl = inputs.temporal.remediation_level.unwrap_or(1.0);
    let rc = inputs.temporal.report_confidence.unwrap_or(1.0);
    let temporal_kernel = round1(base * rl * rc);

    let weeks = weeks_since(inputs.published_date, inputs.now);
    let exploit_prob = asymmetric_laplace_cdf(
        weeks,
        inputs.params.mu,
        inputs.params.lambda,
        inputs.params.kappa,
    );

    let e_min = params::e_min_for_version(inputs.cvss_version);
    let exploit_maturity = e_min + (params::E_MAX - e_min) * exploit_prob;

    let mut score = temporal_kernel * exploit_maturity;

    let epss_bonus = inputs
        .epss_score
        .map(|epss| params::EPSS_BLEND_WEIGHT * epss);
    if let Some(bonus) = epss_bonus {
        score += bonus;
    }

    if inputs.has_exploit {
        score += params::POC_BONUS_MAX;
    }

    if inputs.kev && score < params::KEV_MIN_FLOOR {
        score = params::KEV_MIN_FLOOR;
    }

    ScoreBreakdown {
        secscore: round1(score.clamp(0.0, 10.0)),
        exploit_prob,
        temporal_kernel,
        exploit_maturity,
        e_min,
        weeks,
        epss_bonus,
    }
}
