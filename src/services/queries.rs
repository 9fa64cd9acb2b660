//! Role-scoped read surface: filtered lists, the per-role pending queues,
//! and ordered approval history.
//!
//! Scoping is applied before the query runs: tutors are pinned to their own
//! sheets, lecturers to their own courses, admins see everything. Lists
//! order by (created_at DESC, id DESC) with the id as a stable tie-break.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    domain::{
        models::{ApprovalHistoryEntry, Role, Timesheet, TimesheetStatus},
        permissions,
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    repository::{
        courses::CourseRepository,
        timesheets::{Page, TimesheetFilter, TimesheetRepository},
    },
};

use super::errors::ServiceError;
use super::timesheets::to_actor;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// Query string of `GET /timesheets`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub tutor_id: Option<i64>,
    pub course_id: Option<i64>,
    pub status: Option<TimesheetStatus>,
    pub week_from: Option<NaiveDate>,
    pub week_to: Option<NaiveDate>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub struct QueryService {
    state: Arc<AppState>,
}

impl QueryService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(
        &self,
        actor: &AuthenticatedUser,
        query: ListQuery,
    ) -> Result<Vec<Timesheet>, ServiceError> {
        let mut filter = TimesheetFilter {
            tutor_id: query.tutor_id,
            course_id: query.course_id,
            status: query.status,
            week_from: query.week_from,
            week_to: query.week_to,
            lecturer_scope: None,
        };
        match actor.role {
            Role::Tutor => filter.tutor_id = Some(actor.user_id),
            Role::Lecturer => filter.lecturer_scope = Some(actor.user_id),
            Role::Admin => {}
        }

        let per_page = query
            .per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = query.page.unwrap_or(1).max(1);
        let sheets = TimesheetRepository::list(
            &self.state.pool,
            &filter,
            Page {
                limit: per_page,
                offset: (page - 1) * per_page,
            },
        )
        .await?;
        Ok(sheets)
    }

    pub async fn get(
        &self,
        actor: &AuthenticatedUser,
        timesheet_id: i64,
    ) -> Result<Timesheet, ServiceError> {
        let sheet = TimesheetRepository::find_by_id(&self.state.pool, timesheet_id)
            .await?
            .ok_or(ServiceError::ResourceNotFound)?;
        let course = CourseRepository::find_by_id(&self.state.pool, sheet.course_id)
            .await?
            .ok_or(ServiceError::ResourceNotFound)?;
        permissions::can_view(&to_actor(actor), &sheet, &course)?;
        Ok(sheet)
    }

    /// Role-inferred convenience behind `GET /timesheets/me`.
    pub async fn my_timesheets(
        &self,
        actor: &AuthenticatedUser,
    ) -> Result<Vec<Timesheet>, ServiceError> {
        self.list(actor, ListQuery::default()).await
    }

    /// Sheets awaiting this tutor's confirmation.
    pub async fn pending_for_tutor(
        &self,
        actor: &AuthenticatedUser,
    ) -> Result<Vec<Timesheet>, ServiceError> {
        if actor.role != Role::Tutor {
            return Err(ServiceError::AuthorizationFailed(
                "only tutors have a confirmation queue".into(),
            ));
        }
        Ok(TimesheetRepository::pending_for_tutor(&self.state.pool, actor.user_id).await?)
    }

    /// Final-approval queue: tutor-confirmed sheets for lecturers,
    /// lecturer-confirmed sheets for admins.
    pub async fn pending_final_approval(
        &self,
        actor: &AuthenticatedUser,
    ) -> Result<Vec<Timesheet>, ServiceError> {
        match actor.role {
            Role::Lecturer => {
                Ok(TimesheetRepository::pending_for_lecturer(&self.state.pool, actor.user_id)
                    .await?)
            }
            Role::Admin => Ok(TimesheetRepository::pending_for_admin(&self.state.pool).await?),
            Role::Tutor => Err(ServiceError::AuthorizationFailed(
                "tutors do not hold a final-approval queue".into(),
            )),
        }
    }

    pub async fn history(
        &self,
        actor: &AuthenticatedUser,
        timesheet_id: i64,
    ) -> Result<Vec<ApprovalHistoryEntry>, ServiceError> {
        let sheet = TimesheetRepository::find_by_id(&self.state.pool, timesheet_id)
            .await?
            .ok_or(ServiceError::ResourceNotFound)?;
        let course = CourseRepository::find_by_id(&self.state.pool, sheet.course_id)
            .await?
            .ok_or(ServiceError::ResourceNotFound)?;
        permissions::can_view(&to_actor(actor), &sheet, &course)?;
        Ok(TimesheetRepository::history(&self.state.pool, timesheet_id).await?)
    }
}
