use std::path::PathBuf;

const ENV_DATA_DIR: &str = "SECSCORE_DATA_DIR";
const ENV_TURNSTILE_SITE_KEY: &str = "SECSCORE_TURNSTILE_SITE_KEY";
const ENV_TURNSTILE_SECRET: &str = "SECSCORE_TURNSTILE_SECRET";
const ENV_CRON_SECRET: &str = "SECSCORE_CRON_SECRET";
const ENV_RATE_LIMIT_PER_HOUR: &str = "SECSCORE_RATE_LIMIT_PER_HOUR";

const DEFAULT_DATA_DIR: &str = "data";

/// Application configuration
///
/// Everything is environment-driven; unset or unparsable values fall back
/// to defaults without failing startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// Root directory for bundled and cached data files
    /// (KEV cache/fallback, ExploitDB index, AL parameters).
    pub data_dir: PathBuf,
    /// Turnstile site key, exposed to the front-end. Unused by the core.
    pub turnstile_site_key: Option<String>,
    /// Turnstile secret. CAPTCHA verification is enabled iff this is set.
    pub turnstile_secret: Option<String>,
    /// Shared secret for the internal KEV refresh trigger.
    pub cron_secret: Option<String>,
    /// Requests allowed per client IP per sliding hour.
    pub rate_limit_per_hour: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            turnstile_site_key: None,
            turnstile_secret: None,
            cron_secret: None,
            rate_limit_per_hour: crate::service::ratelimit::DEFAULT_LIMIT_PER_HOUR,
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let data_dir = std::env::var(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        let rate_limit_per_hour = std::env::var(ENV_RATE_LIMIT_PER_HOUR)
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(crate::service::ratelimit::DEFAULT_LIMIT_PER_HOUR);

        Self {
            port,
            host,
            data_dir,
            turnstile_site_key: non_empty_var(ENV_TURNSTILE_SITE_KEY),
            turnstile_secret: non_empty_var(ENV_TURNSTILE_SECRET),
            cron_secret: non_empty_var(ENV_CRON_SECRET),
            rate_limit_per_hour,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether enrichment requests must carry a CAPTCHA token.
    pub fn captcha_enabled(&self) -> bool {
        self.turnstile_secret.is_some()
    }

    pub fn kev_cache_path(&self) -> PathBuf {
        self.data_dir.join("kev-cache.json")
    }

    pub fn kev_fallback_path(&self) -> PathBuf {
        self.data_dir.join("kev-fallback.json")
    }

    pub fn exploitdb_index_path(&self) -> PathBuf {
        self.data_dir.join("exploitdb-index.json")
    }

    pub fn al_params_path(&self) -> PathBuf {
        self.data_dir.join("al-params.json")
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_captcha_disabled() {
        let config = Config::default();
        assert!(!config.captcha_enabled());
        assert!(config.cron_secret.is_none());
        assert_eq!(config.rate_limit_per_hour, 120);
    }

    #[test]
    fn data_paths_are_rooted_in_data_dir() {
        let config = Config {
            data_dir: PathBuf::from("/var/lib/secscore"),
            ..Config::default()
        };
        assert_eq!(
            config.kev_cache_path(),
            PathBuf::from("/var/lib/secscore/kev-cache.json")
        );
        assert_eq!(
            config.al_params_path(),
            PathBuf::from("/var/lib/secscore/al-params.json")
        );
    }
}
