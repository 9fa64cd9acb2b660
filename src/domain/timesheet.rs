//! Timesheet aggregate behavior.
//!
//! The record itself lives in `models`; this module owns the mutations:
//! drafting from a computed quote, status-guarded edits, and approval
//! actions that transition status and emit the matching immutable history
//! entry. Persistence assigns identifiers and enforces the optimistic
//! version check; the aggregate bumps its version on every mutation so a
//! stale writer loses.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::domain::calculator::Quote;
use crate::domain::models::{
    ApprovalAction, ApprovalHistoryEntry, Qualification, TaskType, Timesheet, TimesheetStatus,
};
use crate::domain::workflow::{self, ActionContext};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("action {action:?} is not valid from status {from:?}")]
    InvalidTransition {
        from: TimesheetStatus,
        action: ApprovalAction,
    },
    #[error("the actor does not stand in the required relationship to this timesheet")]
    NotPermitted,
    #[error("a comment is required for this action")]
    CommentRequired,
    #[error("timesheet is not editable in status {0:?}")]
    NotEditable(TimesheetStatus),
}

/// Validated creation input. The quote supplies every pay-derived field.
#[derive(Debug, Clone)]
pub struct NewTimesheet {
    pub tutor_id: i64,
    pub course_id: i64,
    pub week_start: NaiveDate,
    pub task_type: TaskType,
    pub qualification: Qualification,
    pub repeat_session: bool,
    pub description: String,
    pub created_by: i64,
}

/// Editable field set; everything else is quote-derived or server-owned.
#[derive(Debug, Clone)]
pub struct TimesheetEdit {
    pub week_start: NaiveDate,
    pub task_type: TaskType,
    pub qualification: Qualification,
    pub repeat_session: bool,
    pub description: String,
}

impl Timesheet {
    /// Builds an unpersisted DRAFT sheet (id 0 until saved).
    pub fn draft(new: NewTimesheet, quote: &Quote, now: DateTime<Utc>) -> Timesheet {
        Timesheet {
            id: 0,
            tutor_id: new.tutor_id,
            course_id: new.course_id,
            week_start: new.week_start,
            task_type: new.task_type,
            qualification: new.qualification,
            repeat_session: new.repeat_session,
            delivery_hours: quote.delivery_hours,
            associated_hours: quote.associated_hours,
            hourly_rate: quote.hourly_rate,
            amount: quote.amount,
            rate_code: quote.rate_code.clone(),
            clause_reference: quote.clause_reference.clone(),
            formula: quote.formula.clone(),
            description: new.description,
            status: TimesheetStatus::Draft,
            rejection_reason: None,
            created_by: new.created_by,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an edit and its freshly computed quote. Refused outside
    /// DRAFT / MODIFICATION_REQUESTED.
    pub fn apply_edit(
        &mut self,
        edit: TimesheetEdit,
        quote: &Quote,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if !self.status.is_editable() {
            return Err(WorkflowError::NotEditable(self.status));
        }
        self.week_start = edit.week_start;
        self.task_type = edit.task_type;
        self.qualification = edit.qualification;
        self.repeat_session = edit.repeat_session;
        self.description = edit.description;
        self.delivery_hours = quote.delivery_hours;
        self.associated_hours = quote.associated_hours;
        self.hourly_rate = quote.hourly_rate;
        self.amount = quote.amount;
        self.rate_code = quote.rate_code.clone();
        self.clause_reference = quote.clause_reference.clone();
        self.formula = quote.formula.clone();
        self.version += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Validates the (status, action, actor) triple against the workflow
    /// table, transitions status, and returns the unpersisted history entry
    /// recording the step. The entry must be saved in the same transaction
    /// as the status change.
    pub fn apply_action(
        &mut self,
        action: ApprovalAction,
        ctx: &ActionContext,
        comment: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ApprovalHistoryEntry, WorkflowError> {
        let rule = workflow::find_transition(self.status, action).ok_or(
            WorkflowError::InvalidTransition {
                from: self.status,
                action,
            },
        )?;
        if !rule.role_listed(ctx.actor_role) {
            return Err(WorkflowError::InvalidTransition {
                from: self.status,
                action,
            });
        }
        if !rule.permits(ctx) {
            return Err(WorkflowError::NotPermitted);
        }
        let comment = comment.map(str::trim).filter(|c| !c.is_empty());
        if rule.requires_comment && comment.is_none() {
            return Err(WorkflowError::CommentRequired);
        }

        let from = self.status;
        self.status = rule.to;
        if action == ApprovalAction::Reject {
            self.rejection_reason = comment.map(str::to_string);
        }
        self.version += 1;
        self.updated_at = now;

        Ok(ApprovalHistoryEntry {
            id: 0,
            timesheet_id: self.id,
            action,
            from_status: from,
            to_status: rule.to,
            actor_id: ctx.actor_id,
            actor_role: ctx.actor_role,
            comment: comment.map(str::to_string),
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::domain::calculator::{calculate, QuoteInput};
    use crate::domain::models::Role;
    use crate::domain::policy::fixtures::schedule_1;

    fn quote(task_type: TaskType, delivery: rust_decimal::Decimal) -> Quote {
        calculate(
            &schedule_1(),
            QuoteInput {
                task_type,
                qualification: Qualification::Standard,
                repeat_session: false,
                delivery_hours: delivery,
                session_date: NaiveDate::from_ymd_opt(2024, 7, 8).unwrap(),
                contemporaneous: false,
            },
        )
        .unwrap()
    }

    fn draft_sheet() -> Timesheet {
        let mut sheet = Timesheet::draft(
            NewTimesheet {
                tutor_id: 2,
                course_id: 100,
                week_start: NaiveDate::from_ymd_opt(2024, 7, 8).unwrap(),
                task_type: TaskType::Tutorial,
                qualification: Qualification::Standard,
                repeat_session: false,
                description: "Week 2 tutorial".to_string(),
                created_by: 3,
            },
            &quote(TaskType::Tutorial, dec!(1.0)),
            Utc::now(),
        );
        sheet.id = 1;
        sheet
    }

    fn ctx(actor_id: i64, actor_role: Role) -> ActionContext {
        ActionContext {
            actor_id,
            actor_role,
            tutor_id: 2,
            course_lecturer_id: 3,
        }
    }

    #[test]
    fn draft_carries_the_quote_outcome() {
        let sheet = draft_sheet();
        assert_eq!(sheet.status, TimesheetStatus::Draft);
        assert_eq!(sheet.amount, dec!(175.94));
        assert_eq!(sheet.rate_code, "TU2");
        assert_eq!(sheet.version, 1);
    }

    #[test]
    fn submit_transitions_and_records_history() {
        let mut sheet = draft_sheet();
        let entry = sheet
            .apply_action(
                ApprovalAction::SubmitForApproval,
                &ctx(3, Role::Lecturer),
                None,
                Utc::now(),
            )
            .unwrap();

        assert_eq!(sheet.status, TimesheetStatus::PendingTutorConfirmation);
        assert_eq!(sheet.version, 2);
        assert_eq!(entry.from_status, TimesheetStatus::Draft);
        assert_eq!(entry.to_status, TimesheetStatus::PendingTutorConfirmation);
        assert_eq!(entry.actor_id, 3);
        assert_eq!(entry.actor_role, Role::Lecturer);
        assert_eq!(entry.comment, None);
    }

    #[test]
    fn reject_requires_a_comment_and_keeps_state_on_failure() {
        let mut sheet = draft_sheet();
        sheet.status = TimesheetStatus::PendingTutorConfirmation;

        let err = sheet
            .apply_action(
                ApprovalAction::Reject,
                &ctx(2, Role::Tutor),
                Some("   "),
                Utc::now(),
            )
            .unwrap_err();

        assert_eq!(err, WorkflowError::CommentRequired);
        assert_eq!(sheet.status, TimesheetStatus::PendingTutorConfirmation);
        assert_eq!(sheet.version, 1);
    }

    #[test]
    fn reject_stores_the_trimmed_reason() {
        let mut sheet = draft_sheet();
        sheet.status = TimesheetStatus::PendingTutorConfirmation;

        let entry = sheet
            .apply_action(
                ApprovalAction::Reject,
                &ctx(2, Role::Tutor),
                Some("  hours are wrong  "),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(sheet.status, TimesheetStatus::Rejected);
        assert_eq!(sheet.rejection_reason.as_deref(), Some("hours are wrong"));
        assert_eq!(entry.comment.as_deref(), Some("hours are wrong"));
    }

    #[test]
    fn optional_comments_are_accepted_and_recorded() {
        let mut sheet = draft_sheet();
        let entry = sheet
            .apply_action(
                ApprovalAction::SubmitForApproval,
                &ctx(1, Role::Admin),
                Some("resubmitting after rate update"),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(
            entry.comment.as_deref(),
            Some("resubmitting after rate update")
        );
    }

    #[test]
    fn role_off_the_edge_is_an_invalid_transition() {
        let mut sheet = draft_sheet();
        let err = sheet
            .apply_action(
                ApprovalAction::SubmitForApproval,
                &ctx(2, Role::Tutor),
                None,
                Utc::now(),
            )
            .unwrap_err();

        assert_eq!(
            err,
            WorkflowError::InvalidTransition {
                from: TimesheetStatus::Draft,
                action: ApprovalAction::SubmitForApproval,
            }
        );
    }

    #[test]
    fn wrong_relationship_is_not_permitted() {
        let mut sheet = draft_sheet();
        sheet.status = TimesheetStatus::TutorConfirmed;

        let err = sheet
            .apply_action(
                ApprovalAction::LecturerConfirm,
                &ctx(77, Role::Lecturer),
                None,
                Utc::now(),
            )
            .unwrap_err();

        assert_eq!(err, WorkflowError::NotPermitted);
    }

    #[test]
    fn reapplying_from_the_new_state_is_invalid() {
        let mut sheet = draft_sheet();
        sheet
            .apply_action(
                ApprovalAction::SubmitForApproval,
                &ctx(3, Role::Lecturer),
                None,
                Utc::now(),
            )
            .unwrap();

        assert!(matches!(
            sheet.apply_action(
                ApprovalAction::SubmitForApproval,
                &ctx(3, Role::Lecturer),
                None,
                Utc::now(),
            ),
            Err(WorkflowError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn edits_are_refused_once_submitted() {
        let mut sheet = draft_sheet();
        sheet.status = TimesheetStatus::PendingTutorConfirmation;

        let err = sheet
            .apply_edit(
                TimesheetEdit {
                    week_start: sheet.week_start,
                    task_type: TaskType::Marking,
                    qualification: Qualification::Standard,
                    repeat_session: false,
                    description: "marking".to_string(),
                },
                &quote(TaskType::Marking, dec!(4.0)),
                Utc::now(),
            )
            .unwrap_err();

        assert_eq!(
            err,
            WorkflowError::NotEditable(TimesheetStatus::PendingTutorConfirmation)
        );
    }

    #[test]
    fn edits_replace_the_pay_outcome() {
        let mut sheet = draft_sheet();
        sheet
            .apply_edit(
                TimesheetEdit {
                    week_start: sheet.week_start,
                    task_type: TaskType::Marking,
                    qualification: Qualification::Standard,
                    repeat_session: false,
                    description: "assignment 1 marking".to_string(),
                },
                &quote(TaskType::Marking, dec!(4.0)),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(sheet.task_type, TaskType::Marking);
        assert_eq!(sheet.rate_code, "MK1");
        assert_eq!(sheet.amount, dec!(180.00));
        assert_eq!(sheet.associated_hours, rust_decimal::Decimal::ZERO);
        assert_eq!(sheet.version, 2);
    }
}
