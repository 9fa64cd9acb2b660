use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Tutor,
    Lecturer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Tutor => "tutor",
            Role::Lecturer => "lecturer",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tutor" => Ok(Role::Tutor),
            "lecturer" => Ok(Role::Lecturer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimesheetStatus {
    Draft,
    PendingTutorConfirmation,
    TutorConfirmed,
    LecturerConfirmed,
    FinalConfirmed,
    Rejected,
    ModificationRequested,
}

impl TimesheetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimesheetStatus::Draft => "draft",
            TimesheetStatus::PendingTutorConfirmation => "pending_tutor_confirmation",
            TimesheetStatus::TutorConfirmed => "tutor_confirmed",
            TimesheetStatus::LecturerConfirmed => "lecturer_confirmed",
            TimesheetStatus::FinalConfirmed => "final_confirmed",
            TimesheetStatus::Rejected => "rejected",
            TimesheetStatus::ModificationRequested => "modification_requested",
        }
    }

    /// The name clients see, matching the serde representation.
    pub fn wire_name(&self) -> &'static str {
        match self {
            TimesheetStatus::Draft => "DRAFT",
            TimesheetStatus::PendingTutorConfirmation => "PENDING_TUTOR_CONFIRMATION",
            TimesheetStatus::TutorConfirmed => "TUTOR_CONFIRMED",
            TimesheetStatus::LecturerConfirmed => "LECTURER_CONFIRMED",
            TimesheetStatus::FinalConfirmed => "FINAL_CONFIRMED",
            TimesheetStatus::Rejected => "REJECTED",
            TimesheetStatus::ModificationRequested => "MODIFICATION_REQUESTED",
        }
    }

    /// Hours, description, task fields, and week-start may only change while
    /// the sheet sits in one of these two states.
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            TimesheetStatus::Draft | TimesheetStatus::ModificationRequested
        )
    }

    /// Statuses whose amounts are held against the course budget. Draft,
    /// rejected, and modification-requested sheets release their amounts.
    pub fn counts_against_budget(&self) -> bool {
        matches!(
            self,
            TimesheetStatus::PendingTutorConfirmation
                | TimesheetStatus::TutorConfirmed
                | TimesheetStatus::LecturerConfirmed
                | TimesheetStatus::FinalConfirmed
        )
    }

    pub fn all() -> [TimesheetStatus; 7] {
        [
            TimesheetStatus::Draft,
            TimesheetStatus::PendingTutorConfirmation,
            TimesheetStatus::TutorConfirmed,
            TimesheetStatus::LecturerConfirmed,
            TimesheetStatus::FinalConfirmed,
            TimesheetStatus::Rejected,
            TimesheetStatus::ModificationRequested,
        ]
    }
}

impl FromStr for TimesheetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(TimesheetStatus::Draft),
            "pending_tutor_confirmation" => Ok(TimesheetStatus::PendingTutorConfirmation),
            "tutor_confirmed" => Ok(TimesheetStatus::TutorConfirmed),
            "lecturer_confirmed" => Ok(TimesheetStatus::LecturerConfirmed),
            "final_confirmed" => Ok(TimesheetStatus::FinalConfirmed),
            "rejected" => Ok(TimesheetStatus::Rejected),
            "modification_requested" => Ok(TimesheetStatus::ModificationRequested),
            other => Err(format!("unknown timesheet status {other}")),
        }
    }
}

impl fmt::Display for TimesheetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Tutorial,
    Lecture,
    Oraa,
    Demo,
    Marking,
    Other,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Tutorial => "tutorial",
            TaskType::Lecture => "lecture",
            TaskType::Oraa => "oraa",
            TaskType::Demo => "demo",
            TaskType::Marking => "marking",
            TaskType::Other => "other",
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tutorial" => Ok(TaskType::Tutorial),
            "lecture" => Ok(TaskType::Lecture),
            "oraa" => Ok(TaskType::Oraa),
            "demo" => Ok(TaskType::Demo),
            "marking" => Ok(TaskType::Marking),
            "other" => Ok(TaskType::Other),
            other => Err(format!("unknown task type {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Qualification {
    Standard,
    Phd,
    Coordinator,
}

impl Qualification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Qualification::Standard => "standard",
            Qualification::Phd => "phd",
            Qualification::Coordinator => "coordinator",
        }
    }
}

impl FromStr for Qualification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Qualification::Standard),
            "phd" => Ok(Qualification::Phd),
            "coordinator" => Ok(Qualification::Coordinator),
            other => Err(format!("unknown qualification {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalAction {
    SubmitForApproval,
    TutorConfirm,
    LecturerConfirm,
    HrConfirm,
    Reject,
    RequestModification,
}

impl ApprovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::SubmitForApproval => "submit_for_approval",
            ApprovalAction::TutorConfirm => "tutor_confirm",
            ApprovalAction::LecturerConfirm => "lecturer_confirm",
            ApprovalAction::HrConfirm => "hr_confirm",
            ApprovalAction::Reject => "reject",
            ApprovalAction::RequestModification => "request_modification",
        }
    }
}

impl FromStr for ApprovalAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "submit_for_approval" => Ok(ApprovalAction::SubmitForApproval),
            "tutor_confirm" => Ok(ApprovalAction::TutorConfirm),
            "lecturer_confirm" => Ok(ApprovalAction::LecturerConfirm),
            "hr_confirm" => Ok(ApprovalAction::HrConfirm),
            "reject" => Ok(ApprovalAction::Reject),
            "request_modification" => Ok(ApprovalAction::RequestModification),
            other => Err(format!("unknown approval action {other}")),
        }
    }
}

/// Aggregate root. One row per (tutor, course, week); history entries hang
/// off it and are never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Timesheet {
    pub id: i64,
    pub tutor_id: i64,
    pub course_id: i64,
    pub week_start: NaiveDate,
    pub task_type: TaskType,
    pub qualification: Qualification,
    pub repeat_session: bool,
    pub delivery_hours: Decimal,
    pub associated_hours: Decimal,
    pub hourly_rate: Decimal,
    pub amount: Decimal,
    pub rate_code: String,
    pub clause_reference: String,
    pub formula: String,
    pub description: String,
    pub status: TimesheetStatus,
    pub rejection_reason: Option<String>,
    pub created_by: i64,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalHistoryEntry {
    pub id: i64,
    pub timesheet_id: i64,
    pub action: ApprovalAction,
    pub from_status: TimesheetStatus,
    pub to_status: TimesheetStatus,
    pub actor_id: i64,
    pub actor_role: Role,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub lecturer_id: i64,
    pub budget_allocated: Decimal,
    pub budget_used: Decimal,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in TimesheetStatus::all() {
            assert_eq!(status.as_str().parse::<TimesheetStatus>(), Ok(status));
        }
    }

    #[test]
    fn editable_statuses() {
        assert!(TimesheetStatus::Draft.is_editable());
        assert!(TimesheetStatus::ModificationRequested.is_editable());
        assert!(!TimesheetStatus::PendingTutorConfirmation.is_editable());
        assert!(!TimesheetStatus::FinalConfirmed.is_editable());
        assert!(!TimesheetStatus::Rejected.is_editable());
    }

    #[test]
    fn budget_counts_pending_through_final_only() {
        let counted: Vec<_> = TimesheetStatus::all()
            .into_iter()
            .filter(TimesheetStatus::counts_against_budget)
            .collect();
        assert_eq!(
            counted,
            vec![
                TimesheetStatus::PendingTutorConfirmation,
                TimesheetStatus::TutorConfirmed,
                TimesheetStatus::LecturerConfirmed,
                TimesheetStatus::FinalConfirmed,
            ]
        );
    }

    #[test]
    fn wire_names_are_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&TimesheetStatus::PendingTutorConfirmation).unwrap(),
            "\"PENDING_TUTOR_CONFIRMATION\""
        );
        assert_eq!(serde_json::to_string(&TaskType::Oraa).unwrap(), "\"ORAA\"");
        assert_eq!(
            serde_json::to_string(&Qualification::Phd).unwrap(),
            "\"PHD\""
        );
        assert_eq!(
            serde_json::to_string(&ApprovalAction::SubmitForApproval).unwrap(),
            "\"SUBMIT_FOR_APPROVAL\""
        );
    }
}
