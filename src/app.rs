//! Application state and service initialization
//!
//! This module centralizes all service initialization and dependency
//! injection, making it easier to manage the application lifecycle and
//! test services.

use std::sync::Arc;
use std::time::Instant;

use crate::model::Config;
use crate::service::scoring::params::{ModelParamsTable, ParamsError};
use crate::service::{
    CaptchaVerifier, Clock, EnrichmentService, ExploitDbIndex, KevScheduler, KevStore,
    RateLimiter, ResponseCache, SystemClock,
};
use crate::upstream::{EpssClient, KevFeedClient, NvdClient, OsvClient};

/// Application state containing all services and shared resources
///
/// One instance per process, injected into handlers via `web::Data`.
pub struct AppState {
    pub config: Config,
    pub enrichment: Arc<EnrichmentService>,
    pub rate_limiter: RateLimiter,
    /// Present iff a Turnstile secret is configured.
    pub captcha: Option<CaptchaVerifier>,
    pub started_at: Instant,
    kev: Arc<KevStore>,
    scheduler: KevScheduler,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// The KEV catalog itself bootstraps lazily on the first request; this
    /// only wires the dependency graph and loads the AL parameter table.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let params = ModelParamsTable::load(&config.al_params_path())?;

        let kev = Arc::new(KevStore::new(
            config.kev_cache_path(),
            config.kev_fallback_path(),
            KevFeedClient::new(),
            clock.clone(),
        ));

        let exploitdb = Arc::new(ExploitDbIndex::new(config.exploitdb_index_path()));
        let cache = Arc::new(ResponseCache::with_defaults(clock.clone()));

        let enrichment = Arc::new(EnrichmentService::new(
            NvdClient::new(),
            EpssClient::new(),
            OsvClient::new(),
            Arc::clone(&kev),
            exploitdb,
            params,
            cache,
            clock.clone(),
        ));

        let captcha = config.turnstile_secret.clone().map(CaptchaVerifier::new);
        let rate_limiter = RateLimiter::new(config.rate_limit_per_hour, clock);
        let scheduler = KevScheduler::from_env();

        Ok(Self {
            config,
            enrichment,
            rate_limiter,
            captcha,
            started_at: Instant::now(),
            kev,
            scheduler,
        })
    }

    /// Arm the lazily-started background tasks (the KEV refresh timer).
    /// Idempotent; called from every request handler.
    pub fn arm_background_tasks(&self) {
        self.scheduler.ensure_started(Arc::clone(&self.kev));
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The AL parameter table failed to load or lacks `default`
    #[error("Failed to load AL parameter table: {0}")]
    Params(#[from] ParamsError),
}
