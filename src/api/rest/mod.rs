use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use tracing::{error, info};
use uuid::Uuid;

use crate::api::rest::{
    approvals::router as approvals_router, dashboard::router as dashboard_router,
    timesheets::router as timesheets_router,
};
use crate::services::errors::ServiceError;

pub mod approvals;
pub mod dashboard;
pub mod health;
pub mod timesheets;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health::healthcheck))
        .nest("/timesheets", timesheets_router())
        .nest("/approvals", approvals_router())
        .nest("/dashboard", dashboard_router())
}

/// Maps a core error to the problem envelope. Expected domain outcomes pass
/// through quietly, authorization refusals log at info, and persistence
/// failures log at error under the trace id returned to the caller.
pub(crate) fn to_response(err: ServiceError) -> (StatusCode, Json<serde_json::Value>) {
    let trace_id = Uuid::new_v4().to_string();
    match &err {
        ServiceError::AuthorizationFailed(reason) => {
            info!(%trace_id, reason = reason.as_str(), "authorization refused");
        }
        other if other.is_expected() => {}
        other => {
            error!(%trace_id, error = %other, "request failed");
        }
    }

    let mut body = serde_json::json!({
        "success": false,
        "error": err.error_code(),
        "message": err.to_string(),
        "traceId": trace_id,
    });
    match &err {
        ServiceError::Validation(fields) => {
            body["fields"] = serde_json::to_value(fields).unwrap_or_default();
        }
        ServiceError::InvalidTransition { allowed } => {
            body["allowedActions"] = serde_json::to_value(allowed).unwrap_or_default();
        }
        _ => {}
    }

    (err.status_code(), Json(body))
}
