//! Periodic KEV refresh scheduler
//!
//! One refresh timer per process, armed lazily on the first request and
//! aborted on shutdown. The interval comes from
//! `SECSCORE_KEV_REFRESH_HOURS` (positive finite hours; anything else
//! silently falls back to the default); `SECSCORE_KEV_SCHEDULER_DISABLED`
//! switches scheduling off entirely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::service::kev::KevStore;

const ENV_REFRESH_HOURS: &str = "SECSCORE_KEV_REFRESH_HOURS";
const ENV_DISABLED: &str = "SECSCORE_KEV_SCHEDULER_DISABLED";

const DEFAULT_INTERVAL_HOURS: f64 = 6.0;

pub struct KevScheduler {
    /// `None` when the kill-switch is set.
    interval: Option<Duration>,
    started: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl KevScheduler {
    pub fn from_env() -> Self {
        let disabled = is_truthy(std::env::var(ENV_DISABLED).ok().as_deref());
        let interval = (!disabled)
            .then(|| interval_from(std::env::var(ENV_REFRESH_HOURS).ok().as_deref()));

        if disabled {
            tracing::info!("KEV refresh scheduler disabled");
        }

        Self {
            interval,
            started: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Arm the refresh timer if it is not already running. Idempotent and
    /// safe to call from every request handler.
    pub fn ensure_started(&self, store: Arc<KevStore>) {
        let Some(interval) = self.interval else {
            return;
        };
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }

        tracing::info!(interval_secs = interval.as_secs(), "Arming KEV refresh timer");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the refresh itself
            // starts one full interval out.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let outcome = store.refresh().await;
                tracing::debug!(changed = outcome.changed, "Scheduled KEV refresh finished");
            }
        });

        *self.handle.lock() = Some(handle);
    }
}

impl Drop for KevScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }
}

fn interval_from(raw: Option<&str>) -> Duration {
    let hours = raw
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|h| h.is_finite() && *h > 0.0)
        .unwrap_or(DEFAULT_INTERVAL_HOURS);
    Duration::from_secs_f64(hours * 3600.0)
}

fn is_truthy(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_six_hours() {
        assert_eq!(interval_from(None), Duration::from_secs(6 * 3600));
    }

    #[test]
    fn override_interval_parses_hours() {
        assert_eq!(interval_from(Some("1.5")), Duration::from_secs(5400));
        assert_eq!(interval_from(Some("24")), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn bad_interval_values_fall_back_silently() {
        for bad in ["abc", "-2", "0", "NaN", "inf", ""] {
            assert_eq!(
                interval_from(Some(bad)),
                Duration::from_secs(6 * 3600),
                "value {bad:?} should fall back to the default"
            );
        }
    }

    #[test]
    fn kill_switch_values() {
        assert!(is_truthy(Some("1")));
        assert!(is_truthy(Some("true")));
        assert!(is_truthy(Some("YES")));
        assert!(!is_truthy(Some("0")));
        assert!(!is_truthy(Some("false")));
        assert!(!is_truthy(None));
    }
}
