//! Internal endpoints: manual KEV refresh trigger

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::error::ApiError;
use crate::app::AppState;

/// Header carrying the shared refresh secret.
pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub changed: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Manually trigger a KEV catalog refresh.
///
/// Requires the `x-cron-secret` header to match the configured secret;
/// rejected with 401 otherwise (including when no secret is configured).
/// Accepts both POST and GET so schedulers of either persuasion can call
/// it; both routes share this handler.
pub async fn refresh_kev(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let expected = state
        .config
        .cron_secret
        .as_deref()
        .ok_or(ApiError::Unauthorized)?;

    let provided = req
        .headers()
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided != Some(expected) {
        return Err(ApiError::Unauthorized);
    }

    let store = state.enrichment.kev_store();
    store.ensure_ready().await;
    let outcome = store.refresh().await;

    tracing::info!(changed = outcome.changed, "Manual KEV refresh triggered");

    Ok(HttpResponse::Ok().json(RefreshResponse {
        changed: outcome.changed,
        updated_at: outcome.updated_at,
    }))
}

/// Configure internal routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/internal/refresh-kev")
            .route(web::post().to(refresh_kev))
            .route(web::get().to(refresh_kev)),
    );
}
