//! REST API endpoints for CVE metadata and SecScore enrichment

use std::net::IpAddr;

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::app::AppState;
use crate::model::cve::{normalize_cve_id, MODEL_VERSION};
use crate::service::enrichment::CacheStatus;

/// Header carrying the Turnstile token on enrichment requests.
pub const CAPTCHA_TOKEN_HEADER: &str = "x-captcha-token";

const CACHE_CONTROL: &str = "public, max-age=3600, stale-while-revalidate=86400";

/// Normalized NVD metadata for a CVE
#[utoipa::path(
    get,
    path = "/api/v1/cve/{cve_id}",
    params(
        ("cve_id" = String, Path, description = "CVE identifier (CVE-YYYY-NNNN...)")
    ),
    responses(
        (status = 200, description = "Normalized CVE metadata", body = crate::model::cve::CveMetadata),
        (status = 400, description = "Malformed CVE identifier"),
        (status = 404, description = "CVE not found in NVD"),
        (status = 429, description = "Rate limit exceeded")
    ),
    tag = "cve"
)]
#[get("/api/v1/cve/{cve_id}")]
pub async fn get_cve(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    let request_id = new_request_id(&state, &req)?;
    let cve_id = validate(&path)?;

    let (metadata, status) = state.enrichment.metadata(&cve_id).await?;

    let mut builder = HttpResponse::Ok();
    common_headers(&mut builder, &request_id, status);
    Ok(builder.json(metadata))
}

/// Full SecScore enrichment for a CVE
#[utoipa::path(
    get,
    path = "/api/v1/enrich/cve/{cve_id}",
    params(
        ("cve_id" = String, Path, description = "CVE identifier (CVE-YYYY-NNNN...)")
    ),
    responses(
        (status = 200, description = "SecScore response", body = crate::model::cve::SecScoreResponse),
        (status = 400, description = "Malformed CVE identifier or missing CAPTCHA token"),
        (status = 403, description = "CAPTCHA verification failed"),
        (status = 404, description = "CVE not found in NVD"),
        (status = 429, description = "Rate limit exceeded")
    ),
    tag = "cve"
)]
#[get("/api/v1/enrich/cve/{cve_id}")]
pub async fn enrich_cve(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    let request_id = new_request_id(&state, &req)?;
    let cve_id = validate(&path)?;

    if let Some(verifier) = &state.captcha {
        let token = req
            .headers()
            .get(CAPTCHA_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::MissingCaptchaToken)?;

        let remote_ip = req.peer_addr().map(|addr| addr.ip().to_string());
        verifier.verify(token, remote_ip.as_deref()).await?;
    }

    let (response, status) = state.enrichment.enrich(&cve_id).await?;

    let mut builder = HttpResponse::Ok();
    common_headers(&mut builder, &request_id, status);
    if let Some(updated_at) = state.enrichment.kev_updated_at() {
        builder.insert_header(("X-KEV-Updated-At", updated_at.to_rfc3339()));
    }
    Ok(builder.json(response))
}

/// Per-request bookkeeping shared by both endpoints: request id, lazy
/// scheduler arming, and the sliding-window rate limit.
fn new_request_id(state: &AppState, req: &HttpRequest) -> Result<String, ApiError> {
    state.arm_background_tasks();

    if !state.rate_limiter.check(client_ip(req)) {
        return Err(ApiError::RateLimited);
    }

    Ok(Uuid::new_v4().to_string())
}

fn validate(raw: &str) -> Result<String, ApiError> {
    normalize_cve_id(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("'{raw}' is not a valid CVE identifier")))
}

fn common_headers(
    builder: &mut actix_web::HttpResponseBuilder,
    request_id: &str,
    status: CacheStatus,
) {
    builder
        .insert_header(("X-Request-Id", request_id))
        .insert_header(("SecScore-Model-Version", MODEL_VERSION))
        .insert_header((
            "X-Cache",
            match status {
                CacheStatus::Hit => "HIT",
                CacheStatus::Miss => "MISS",
            },
        ))
        .insert_header(("Cache-Control", CACHE_CONTROL));
}

fn client_ip(req: &HttpRequest) -> IpAddr {
    req.peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or_else(|| IpAddr::from([0, 0, 0, 0]))
}

/// Configure CVE routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_cve).service(enrich_cve);
}
