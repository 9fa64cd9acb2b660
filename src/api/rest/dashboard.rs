use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::get,
    Json, Router,
};

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::dashboard::{DashboardQuery, DashboardService},
};

use super::to_response;

type HandlerResult =
    Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)>;

pub fn router() -> Router {
    Router::new().route("/summary", get(summary))
}

async fn summary(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<DashboardQuery>,
) -> HandlerResult {
    let service = DashboardService::new(state);
    let summary = service.summary(&user, query).await.map_err(to_response)?;
    Ok(Json(
        serde_json::json!({ "success": true, "summary": summary }),
    ))
}
