use actix_web::{HttpResponse, get, web};
use serde::Serialize;
use tracing::warn;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// Liveness plus a storage ping
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match state.persistence.health_check().await {
        Ok(()) => HttpResponse::Ok().json(HealthStatus { status: "UP" }),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(HealthStatus { status: "DOWN" })
        }
    }
}

/// Prometheus text exposition of the delivery counters
#[get("/metrics")]
pub async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    match &state.prometheus {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NotFound().finish(),
    }
}
