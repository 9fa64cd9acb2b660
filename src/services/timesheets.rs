//! Timesheet lifecycle orchestration.
//!
//! Backs the REST handlers mounted under `/timesheets`: pure quotes, draft
//! creation, editable-status updates, and draft deletion. Every mutating
//! operation runs inside exactly one transaction; the enterprise-agreement
//! quote is recomputed server-side on every write so stored pay fields can
//! never drift from policy.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::{
    domain::{
        calculator::{self, Quote, QuoteInput},
        models::{Qualification, Role, TaskType, Timesheet, TimesheetStatus},
        permissions::{self, Actor},
        timesheet::{NewTimesheet, TimesheetEdit, WorkflowError},
        week,
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    repository::{
        courses::CourseRepository, timesheets::TimesheetRepository, users::UserRepository,
    },
};

use super::errors::{FieldError, ServiceError};

/// Payload for `POST /timesheets/quote`. Never persisted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub task_type: TaskType,
    pub qualification: Qualification,
    #[serde(default)]
    pub repeat: bool,
    pub delivery_hours: Decimal,
    pub session_date: NaiveDate,
    #[serde(default)]
    pub contemporaneous: bool,
}

/// Payload for `POST /timesheets`. The week both anchors the sheet and
/// selects the policy window.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimesheetRequest {
    pub tutor_id: i64,
    pub course_id: i64,
    pub week_start_date: NaiveDate,
    pub task_type: TaskType,
    pub qualification: Qualification,
    #[serde(default)]
    pub repeat: bool,
    pub delivery_hours: Decimal,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub description: String,
    #[serde(default)]
    pub contemporaneous: bool,
}

/// Payload for `PUT /timesheets/{id}`. The optional version lets clients
/// detect concurrent edits instead of silently overwriting them.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimesheetRequest {
    pub week_start_date: NaiveDate,
    pub task_type: TaskType,
    pub qualification: Qualification,
    #[serde(default)]
    pub repeat: bool,
    pub delivery_hours: Decimal,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub description: String,
    #[serde(default)]
    pub contemporaneous: bool,
    #[serde(default)]
    pub version: Option<i32>,
}

pub struct TimesheetService {
    state: Arc<AppState>,
}

impl TimesheetService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Computes the pay outcome for proposed inputs without persisting.
    /// Any authenticated role may quote values it could legally submit.
    pub fn quote(&self, payload: QuoteRequest) -> Result<Quote, ServiceError> {
        self.check_hours(payload.task_type, payload.delivery_hours)?;
        self.quote_for(
            payload.task_type,
            payload.qualification,
            payload.repeat,
            payload.delivery_hours,
            payload.session_date,
            payload.contemporaneous,
        )
    }

    /// Creates a DRAFT timesheet for a tutor. Lecturers create within their
    /// own courses, admins anywhere, tutors never.
    pub async fn create(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateTimesheetRequest,
    ) -> Result<Timesheet, ServiceError> {
        payload.validate()?;
        self.check_description(&payload.description)?;
        self.check_week(payload.week_start_date)?;
        self.check_hours(payload.task_type, payload.delivery_hours)?;

        let mut tx = self.state.pool.begin().await?;

        let course = CourseRepository::find_by_id_for_update(tx.as_mut(), payload.course_id)
            .await?
            .ok_or(ServiceError::ResourceNotFound)?;
        permissions::can_create(&to_actor(actor), &course)?;

        match UserRepository::find_by_id(tx.as_mut(), payload.tutor_id).await? {
            Some(user) if user.role == Role::Tutor && user.active => {}
            _ => {
                return Err(ServiceError::Validation(vec![FieldError::new(
                    "tutorId",
                    "must reference an active tutor",
                )]))
            }
        }

        if TimesheetRepository::exists_for_week(
            tx.as_mut(),
            payload.tutor_id,
            payload.course_id,
            payload.week_start_date,
        )
        .await?
        {
            return Err(ServiceError::DuplicateTimesheet);
        }

        let quote = self.quote_for(
            payload.task_type,
            payload.qualification,
            payload.repeat,
            payload.delivery_hours,
            payload.week_start_date,
            payload.contemporaneous,
        )?;

        if course.budget_used + quote.amount > course.budget_allocated {
            return Err(ServiceError::BudgetExceeded);
        }

        let sheet = Timesheet::draft(
            NewTimesheet {
                tutor_id: payload.tutor_id,
                course_id: payload.course_id,
                week_start: payload.week_start_date,
                task_type: payload.task_type,
                qualification: payload.qualification,
                repeat_session: payload.repeat,
                description: payload.description.trim().to_string(),
                created_by: actor.user_id,
            },
            &quote,
            Utc::now(),
        );
        let saved = TimesheetRepository::insert(tx.as_mut(), &sheet).await?;

        tx.commit().await?;
        Ok(saved)
    }

    /// Re-quotes and rewrites an editable timesheet in one transaction.
    pub async fn update(
        &self,
        actor: &AuthenticatedUser,
        timesheet_id: i64,
        payload: UpdateTimesheetRequest,
    ) -> Result<Timesheet, ServiceError> {
        payload.validate()?;
        self.check_description(&payload.description)?;
        self.check_week(payload.week_start_date)?;
        self.check_hours(payload.task_type, payload.delivery_hours)?;

        let mut tx = self.state.pool.begin().await?;

        let sheet = TimesheetRepository::find_by_id_for_update(tx.as_mut(), timesheet_id)
            .await?
            .ok_or(ServiceError::ResourceNotFound)?;
        let course = CourseRepository::find_by_id_for_update(tx.as_mut(), sheet.course_id)
            .await?
            .ok_or(ServiceError::ResourceNotFound)?;
        permissions::can_edit(&to_actor(actor), &sheet, &course)?;

        if let Some(expected) = payload.version {
            if expected != sheet.version {
                return Err(ServiceError::ConcurrentModification);
            }
        }

        let quote = self.quote_for(
            payload.task_type,
            payload.qualification,
            payload.repeat,
            payload.delivery_hours,
            payload.week_start_date,
            payload.contemporaneous,
        )?;

        // Editable statuses never count against the budget, so nothing is
        // released here; the new amount just has to fit.
        if course.budget_used + quote.amount > course.budget_allocated {
            return Err(ServiceError::BudgetExceeded);
        }

        let stored_version = sheet.version;
        let mut updated = sheet;
        updated
            .apply_edit(
                TimesheetEdit {
                    week_start: payload.week_start_date,
                    task_type: payload.task_type,
                    qualification: payload.qualification,
                    repeat_session: payload.repeat,
                    description: payload.description.trim().to_string(),
                },
                &quote,
                Utc::now(),
            )
            .map_err(map_workflow_error)?;

        if !TimesheetRepository::update(tx.as_mut(), &updated, stored_version).await? {
            return Err(ServiceError::ConcurrentModification);
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Deletes a DRAFT timesheet. Anything past DRAFT is history-bearing
    /// and must be rejected instead of removed.
    pub async fn delete(
        &self,
        actor: &AuthenticatedUser,
        timesheet_id: i64,
    ) -> Result<(), ServiceError> {
        let mut tx = self.state.pool.begin().await?;

        let sheet = TimesheetRepository::find_by_id_for_update(tx.as_mut(), timesheet_id)
            .await?
            .ok_or(ServiceError::ResourceNotFound)?;
        let course = CourseRepository::find_by_id(tx.as_mut(), sheet.course_id)
            .await?
            .ok_or(ServiceError::ResourceNotFound)?;
        permissions::can_delete(&to_actor(actor), &sheet, &course)?;

        if sheet.status != TimesheetStatus::Draft {
            return Err(ServiceError::NotEditable);
        }

        TimesheetRepository::delete(tx.as_mut(), timesheet_id).await?;
        tx.commit().await?;
        Ok(())
    }

    fn quote_for(
        &self,
        task_type: TaskType,
        qualification: Qualification,
        repeat: bool,
        delivery_hours: Decimal,
        session_date: NaiveDate,
        contemporaneous: bool,
    ) -> Result<Quote, ServiceError> {
        let policies = self.state.policies.snapshot();
        Ok(calculator::calculate(
            &policies,
            QuoteInput {
                task_type,
                qualification,
                repeat_session: repeat,
                delivery_hours,
                session_date,
                contemporaneous,
            },
        )?)
    }

    fn check_description(&self, description: &str) -> Result<(), ServiceError> {
        if description.trim().is_empty() {
            return Err(ServiceError::DescriptionRequired);
        }
        Ok(())
    }

    fn check_week(&self, week_start: NaiveDate) -> Result<(), ServiceError> {
        if self.state.config.week_start.monday_only && !week::is_monday(week_start) {
            return Err(ServiceError::WeekNotMonday);
        }
        if week_start > week::current_monday() {
            return Err(ServiceError::WeekInFuture);
        }
        Ok(())
    }

    fn check_hours(
        &self,
        task_type: TaskType,
        delivery_hours: Decimal,
    ) -> Result<(), ServiceError> {
        if delivery_hours <= Decimal::ZERO {
            return Err(ServiceError::NonPositiveHours);
        }
        // Tutorial delivery is fixed at 1.0 by the calculator; the
        // configurable bounds govern the hourly task types.
        if task_type != TaskType::Tutorial {
            let hours = &self.state.config.hours;
            if delivery_hours < hours.min || delivery_hours > hours.max {
                return Err(ServiceError::HoursOutOfRange {
                    min: hours.min,
                    max: hours.max,
                });
            }
        }
        Ok(())
    }
}

pub(crate) fn to_actor(actor: &AuthenticatedUser) -> Actor {
    Actor {
        id: actor.user_id,
        role: actor.role,
    }
}

pub(crate) fn map_workflow_error(err: WorkflowError) -> ServiceError {
    match err {
        WorkflowError::InvalidTransition { .. } => ServiceError::InvalidTransition {
            allowed: Vec::new(),
        },
        WorkflowError::NotPermitted => {
            ServiceError::AuthorizationFailed("not permitted to act on this timesheet".into())
        }
        WorkflowError::CommentRequired => ServiceError::CommentRequired,
        WorkflowError::NotEditable(_) => ServiceError::NotEditable,
    }
}
