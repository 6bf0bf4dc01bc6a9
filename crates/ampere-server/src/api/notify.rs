use actix_web::{HttpResponse, post, web};
use ampere_common::ResourceKind;
use ampere_notify::QueueError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub resource_kind: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub enqueued: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Run the dispatch trigger for a committed batch
#[post("/v1/notify")]
pub async fn notify_resource_changed(
    state: web::Data<AppState>,
    body: web::Json<NotifyRequest>,
) -> HttpResponse {
    let NotifyRequest {
        resource_kind,
        timestamp,
    } = body.into_inner();

    let kind: ResourceKind = match resource_kind.parse() {
        Ok(kind) => kind,
        Err(e) => {
            warn!(resource_kind = %resource_kind, "Rejected notify request");
            return HttpResponse::BadRequest().json(ErrorBody {
                error: format!("{}", e),
            });
        }
    };

    debug!(kind = %kind, timestamp = %timestamp, "Notify request received");
    match state.dispatch.notify_resource_changed(kind, timestamp).await {
        Ok(enqueued) => HttpResponse::Accepted().json(NotifyResponse { enqueued }),
        Err(e) if e.downcast_ref::<QueueError>() == Some(&QueueError::Full) => {
            warn!(kind = %kind, timestamp = %timestamp, error = %e, "Notification queue full");
            HttpResponse::ServiceUnavailable().json(ErrorBody {
                error: e.to_string(),
            })
        }
        Err(e) => {
            error!(kind = %kind, timestamp = %timestamp, error = %e, "Dispatch failed");
            HttpResponse::InternalServerError().json(ErrorBody {
                error: e.to_string(),
            })
        }
    }
}
