//! Approval workflow application.
//!
//! Backing service for `POST /approvals`. One operation: apply an approval
//! action to a timesheet. The sheet is loaded under a row lock, the actor's
//! role is resolved from the identity store (not the token), the workflow
//! table and permission policy are consulted, and the status change, the
//! history entry, and any budget-boundary adjustment commit atomically.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    domain::{
        models::{ApprovalHistoryEntry, Timesheet},
        timesheet::WorkflowError,
        workflow::{self, ActionContext},
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    repository::{
        courses::CourseRepository, timesheets::TimesheetRepository, users::UserRepository,
    },
};

use super::errors::ServiceError;

/// Body of `POST /approvals`. Comments are mandatory for REJECT and
/// REQUEST_MODIFICATION and welcome everywhere else.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub timesheet_id: i64,
    pub action: crate::domain::models::ApprovalAction,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
    pub timesheet: Timesheet,
    pub history_entry: ApprovalHistoryEntry,
}

pub struct ApprovalService {
    state: Arc<AppState>,
}

impl ApprovalService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn apply(
        &self,
        actor: &AuthenticatedUser,
        request: ApprovalRequest,
    ) -> Result<ApprovalOutcome, ServiceError> {
        let mut tx = self.state.pool.begin().await?;

        let sheet = TimesheetRepository::find_by_id_for_update(tx.as_mut(), request.timesheet_id)
            .await?
            .ok_or(ServiceError::ResourceNotFound)?;
        let course = CourseRepository::find_by_id_for_update(tx.as_mut(), sheet.course_id)
            .await?
            .ok_or_else(|| {
                ServiceError::Persistence(format!(
                    "course {} missing for timesheet {}",
                    sheet.course_id, sheet.id
                ))
            })?;

        let user = UserRepository::find_by_id(tx.as_mut(), actor.user_id)
            .await?
            .ok_or_else(|| ServiceError::AuthorizationFailed("unknown user".into()))?;
        if !user.active {
            return Err(ServiceError::AuthorizationFailed(
                "user account is inactive".into(),
            ));
        }

        let ctx = ActionContext {
            actor_id: user.id,
            actor_role: user.role,
            tutor_id: sheet.tutor_id,
            course_lecturer_id: course.lecturer_id,
        };

        let stored_version = sheet.version;
        let was_counted = sheet.status.counts_against_budget();
        let mut updated = sheet.clone();
        let entry = updated
            .apply_action(
                request.action,
                &ctx,
                request.comment.as_deref(),
                Utc::now(),
            )
            .map_err(|err| match err {
                WorkflowError::InvalidTransition { from, .. } => {
                    ServiceError::InvalidTransition {
                        allowed: workflow::allowed_actions(from, &ctx),
                    }
                }
                WorkflowError::NotPermitted => ServiceError::AuthorizationFailed(
                    "not permitted to act on this timesheet".into(),
                ),
                WorkflowError::CommentRequired => ServiceError::CommentRequired,
                WorkflowError::NotEditable(_) => ServiceError::NotEditable,
            })?;

        // Amounts enter the course budget when a sheet moves into a counted
        // status and leave it when rejected or sent back for modification.
        let is_counted = updated.status.counts_against_budget();
        if !was_counted && is_counted {
            if course.budget_used + updated.amount > course.budget_allocated {
                return Err(ServiceError::BudgetExceeded);
            }
            CourseRepository::adjust_budget_used(tx.as_mut(), course.id, updated.amount).await?;
        } else if was_counted && !is_counted {
            CourseRepository::adjust_budget_used(tx.as_mut(), course.id, -sheet.amount).await?;
        }

        if !TimesheetRepository::update(tx.as_mut(), &updated, stored_version).await? {
            return Err(ServiceError::ConcurrentModification);
        }
        let entry = TimesheetRepository::insert_history(tx.as_mut(), &entry).await?;

        tx.commit().await?;

        info!(
            timesheet_id = updated.id,
            action = request.action.as_str(),
            from = entry.from_status.as_str(),
            to = entry.to_status.as_str(),
            actor_id = user.id,
            "approval action applied"
        );

        Ok(ApprovalOutcome {
            timesheet: updated,
            history_entry: entry,
        })
    }
}
