//! OpenAPI specification endpoint

use actix_web::{get, HttpResponse, Responder};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::cve::get_cve,
        crate::api::cve::enrich_cve,
        crate::api::health::health,
    ),
    components(schemas(
        crate::model::cve::CveMetadata,
        crate::model::cve::TemporalMultipliers,
        crate::model::cve::SecScoreResponse,
        crate::model::cve::EpssSignal,
        crate::model::cve::ExploitEvidence,
        crate::model::cve::ExplanationEntry,
        crate::model::cve::AlParams,
        crate::model::kev::KevEntry,
        crate::model::osv::AffectedPackage,
        crate::model::osv::AffectedRange,
        crate::model::osv::AffectedEvent,
        crate::api::health::HealthStatus,
        crate::api::health::KevHealth,
        crate::api::admin::RefreshResponse,
    )),
    tags(
        (name = "cve", description = "CVE metadata and SecScore enrichment"),
        (name = "health", description = "Process health")
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Configure OpenAPI routes
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(openapi_json);
}
