use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::queries::{ListQuery, QueryService},
    services::timesheets::{
        CreateTimesheetRequest, QuoteRequest, TimesheetService, UpdateTimesheetRequest,
    },
};

use super::to_response;

type HandlerResult =
    Result<Json<serde_json::Value>, (axum::http::StatusCode, Json<serde_json::Value>)>;

pub fn router() -> Router {
    Router::new()
        .route("/quote", post(quote))
        .route("/", post(create).get(list))
        .route("/me", get(my_timesheets))
        .route("/pending-approval", get(pending_approval))
        .route("/pending-final-approval", get(pending_final_approval))
        .route("/config", get(ui_config))
        .route(
            "/:id",
            get(get_timesheet)
                .put(update_timesheet)
                .delete(delete_timesheet),
        )
}

async fn quote(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Json(payload): Json<QuoteRequest>,
) -> HandlerResult {
    let service = TimesheetService::new(state);
    let quote = service.quote(payload).map_err(to_response)?;
    Ok(Json(serde_json::json!({ "success": true, "quote": quote })))
}

async fn create(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateTimesheetRequest>,
) -> HandlerResult {
    let service = TimesheetService::new(state);
    let timesheet = service.create(&user, payload).await.map_err(to_response)?;
    Ok(Json(
        serde_json::json!({ "success": true, "timesheet": timesheet }),
    ))
}

async fn list(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> HandlerResult {
    let service = QueryService::new(state);
    let timesheets = service.list(&user, query).await.map_err(to_response)?;
    Ok(Json(
        serde_json::json!({ "success": true, "timesheets": timesheets }),
    ))
}

async fn my_timesheets(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> HandlerResult {
    let service = QueryService::new(state);
    let timesheets = service.my_timesheets(&user).await.map_err(to_response)?;
    Ok(Json(
        serde_json::json!({ "success": true, "timesheets": timesheets }),
    ))
}

async fn pending_approval(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> HandlerResult {
    let service = QueryService::new(state);
    let timesheets = service.pending_for_tutor(&user).await.map_err(to_response)?;
    Ok(Json(
        serde_json::json!({ "success": true, "timesheets": timesheets }),
    ))
}

async fn pending_final_approval(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> HandlerResult {
    let service = QueryService::new(state);
    let timesheets = service
        .pending_final_approval(&user)
        .await
        .map_err(to_response)?;
    Ok(Json(
        serde_json::json!({ "success": true, "timesheets": timesheets }),
    ))
}

/// UI constraint document: hour bounds, week anchoring, currency.
async fn ui_config(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> HandlerResult {
    let config = &state.config;
    Ok(Json(serde_json::json!({
        "success": true,
        "config": {
            "hours": {
                "min": config.hours.min,
                "max": config.hours.max,
                "step": config.hours.step,
            },
            "weekStart": { "mondayOnly": config.week_start.monday_only },
            "currency": config.currency,
        },
    })))
}

async fn get_timesheet(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> HandlerResult {
    let service = QueryService::new(state);
    let timesheet = service.get(&user, id).await.map_err(to_response)?;
    Ok(Json(
        serde_json::json!({ "success": true, "timesheet": timesheet }),
    ))
}

async fn update_timesheet(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTimesheetRequest>,
) -> HandlerResult {
    let service = TimesheetService::new(state);
    let timesheet = service
        .update(&user, id, payload)
        .await
        .map_err(to_response)?;
    Ok(Json(
        serde_json::json!({ "success": true, "timesheet": timesheet }),
    ))
}

async fn delete_timesheet(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> HandlerResult {
    let service = TimesheetService::new(state);
    service.delete(&user, id).await.map_err(to_response)?;
    Ok(Json(serde_json::json!({ "success": true })))
}
