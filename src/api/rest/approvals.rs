use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::approvals::{ApprovalRequest, ApprovalService},
    services::queries::QueryService,
};

use super::to_response;

type HandlerResult =
    Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)>;

pub fn router() -> Router {
    Router::new()
        .route("/", post(apply))
        .route("/history/:id", get(history))
}

async fn apply(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<ApprovalRequest>,
) -> HandlerResult {
    let service = ApprovalService::new(state);
    let outcome = service.apply(&user, payload).await.map_err(to_response)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "timesheet": outcome.timesheet,
        "historyEntry": outcome.history_entry,
    })))
}

async fn history(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> HandlerResult {
    let service = QueryService::new(state);
    let entries = service.history(&user, id).await.map_err(to_response)?;
    Ok(Json(
        serde_json::json!({ "success": true, "history": entries }),
    ))
}
