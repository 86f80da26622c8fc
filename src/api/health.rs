//! Health check endpoint
//!
//! Reports process uptime, memory and CPU use, and KEV dataset freshness.

use actix_web::{get, web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::System;
use utoipa::ToSchema;

use crate::app::AppState;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub memory_bytes: Option<u64>,
    pub cpu_percent: Option<f32>,
    pub kev: KevHealth,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KevHealth {
    pub entries: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Process health and KEV dataset freshness
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is running", body = HealthStatus)
    ),
    tag = "health"
)]
#[get("/api/health")]
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    let (memory_bytes, cpu_percent) = process_stats();
    let kev_snapshot = state.enrichment.kev_store().snapshot();

    HttpResponse::Ok().json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        memory_bytes,
        cpu_percent,
        kev: KevHealth {
            entries: kev_snapshot.len(),
            updated_at: kev_snapshot.updated_at(),
        },
    })
}

fn process_stats() -> (Option<u64>, Option<f32>) {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return (None, None);
    };

    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return (None, None);
    }

    match sys.process(pid) {
        Some(process) => (Some(process.memory()), Some(process.cpu_usage())),
        None => (None, None),
    }
}

/// Configure health check routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health);
}
