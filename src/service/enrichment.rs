//! Per-request enrichment orchestration
//!
//! Fans out to NVD, EPSS and OSV in parallel, consults the local KEV and
//! ExploitDB indices, runs the scoring engine and assembles the response.
//! Partial degradation is preferred over failing the whole request: only
//! a CVE that NVD does not know yields an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::cve::{CveMetadata, SecScoreResponse, MODEL_VERSION};
use crate::service::cache::ResponseCache;
use crate::service::clock::Clock;
use crate::service::exploitdb::ExploitDbIndex;
use crate::service::kev::KevStore;
use crate::service::scoring::explain::{build_explanation, ExplainContext};
use crate::service::scoring::params::{infer_category, ModelParamsTable};
use crate::service::scoring::{compute_sec_score, ScoreInputs};
use crate::upstream::{EpssClient, NvdClient, OsvClient};

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("CVE not found: {0}")]
    NotFound(String),
}

/// Whether the response came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

pub struct EnrichmentService {
    nvd: NvdClient,
    epss: EpssClient,
    osv: OsvClient,
    kev: Arc<KevStore>,
    exploitdb: Arc<ExploitDbIndex>,
    params: ModelParamsTable,
    cache: Arc<ResponseCache>,
    clock: Arc<dyn Clock>,
}

impl EnrichmentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nvd: NvdClient,
        epss: EpssClient,
        osv: OsvClient,
        kev: Arc<KevStore>,
        exploitdb: Arc<ExploitDbIndex>,
        params: ModelParamsTable,
        cache: Arc<ResponseCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            nvd,
            epss,
            osv,
            kev,
            exploitdb,
            params,
            cache,
            clock,
        }
    }

    /// Last successful KEV dataset update, for the freshness header.
    pub fn kev_updated_at(&self) -> Option<DateTime<Utc>> {
        self.kev.updated_at()
    }

    pub fn kev_store(&self) -> &Arc<KevStore> {
        &self.kev
    }

    /// Normalized NVD metadata, cached with the shared TTL.
    pub async fn metadata(
        &self,
        cve_id: &str,
    ) -> Result<(CveMetadata, CacheStatus), EnrichmentError> {
        if let Some(meta) = self.cache.get_metadata(cve_id, MODEL_VERSION) {
            return Ok((meta, CacheStatus::Hit));
        }

        let meta = self
            .nvd
            .fetch_or_default(cve_id)
            .await
            .map_err(|_| EnrichmentError::NotFound(cve_id.to_string()))?;

        self.cache.set_metadata(cve_id, &meta);
        Ok((meta, CacheStatus::Miss))
    }

    /// Full SecScore enrichment for a CVE.
    pub async fn enrich(
        &self,
        cve_id: &str,
    ) -> Result<(SecScoreResponse, CacheStatus), EnrichmentError> {
        if let Some(response) = self.cache.get_enrichment(cve_id, MODEL_VERSION) {
            return Ok((response, CacheStatus::Hit));
        }

        self.kev.ensure_ready().await;

        let now = self.clock.now();
        let (nvd_result, epss, osv) = tokio::join!(
            self.nvd.fetch_or_default(cve_id),
            self.epss.fetch_signal(cve_id, now),
            self.osv.fetch_affected(cve_id),
        );

        let meta =
            nvd_result.map_err(|_| EnrichmentError::NotFound(cve_id.to_string()))?;

        let kev_listed = self.kev.contains(cve_id);
        let exploits = self.exploitdb.lookup(cve_id);

        let category = infer_category(&meta.cpe);
        let params = self.params.get(category);

        let breakdown = compute_sec_score(&ScoreInputs {
            cvss_base: meta.cvss_base,
            cvss_version: meta.cvss_version.as_deref(),
            temporal: meta.temporal_multipliers,
            published_date: meta.published_date,
            now,
            params,
            epss_score: epss.as_ref().map(|e| e.score),
            has_exploit: !exploits.is_empty(),
            kev: kev_listed,
        });

        let explanation = build_explanation(&ExplainContext {
            category,
            params,
            breakdown: &breakdown,
            kev: kev_listed,
            exploits: &exploits,
            epss: epss.as_ref(),
            cvss_base: meta.cvss_base,
        });

        tracing::info!(
            cve_id = %cve_id,
            secscore = breakdown.secscore,
            category = category,
            kev = kev_listed,
            exploits = exploits.len(),
            "Computed SecScore"
        );

        let response = SecScoreResponse {
            cve_id: meta.cve_id,
            published_date: meta.published_date,
            cvss_base: meta.cvss_base,
            cvss_vector: meta.cvss_vector,
            secscore: breakdown.secscore,
            exploit_prob: breakdown.exploit_prob,
            model_category: category.to_string(),
            model_params: params,
            epss,
            exploits,
            kev: kev_listed,
            osv,
            explanation,
            computed_at: self.clock.now(),
            model_version: MODEL_VERSION.to_string(),
        };

        self.cache.set_enrichment(cve_id, &response);
        Ok((response, CacheStatus::Miss))
    }
}
