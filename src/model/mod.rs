pub mod config;
pub mod cve;
pub mod kev;
pub mod osv;

pub use config::Config;
pub use cve::{
    normalize_cve_id, AlParams, CveMetadata, EpssSignal, ExplanationEntry, ExploitEvidence,
    SecScoreResponse, TemporalMultipliers, MODEL_VERSION,
};
pub use kev::{KevEntry, KevFile, KevPayload};
pub use osv::AffectedPackage;
