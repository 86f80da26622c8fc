pub mod cache;
pub mod captcha;
pub mod clock;
pub mod enrichment;
pub mod exploitdb;
pub mod kev;
pub mod ratelimit;
pub mod scheduler;
pub mod scoring;

pub use cache::ResponseCache;
pub use captcha::{CaptchaError, CaptchaVerifier};
pub use clock::{Clock, SystemClock};
pub use enrichment::{CacheStatus, EnrichmentError, EnrichmentService};
pub use exploitdb::ExploitDbIndex;
pub use kev::{KevStore, RefreshOutcome};
pub use ratelimit::RateLimiter;
pub use scheduler::KevScheduler;
