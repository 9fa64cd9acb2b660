use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::calculator::CalculationError;
use crate::domain::models::ApprovalAction;
use crate::domain::permissions::PermissionDenied;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every exit path of the core produces either a value or one of these.
/// `error_code` values are stable and part of the wire contract.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("tutorial delivery is fixed at 1.0 hour")]
    InvalidTutorialDelivery,
    #[error("week start must be a Monday")]
    WeekNotMonday,
    #[error("week start may not be in the future")]
    WeekInFuture,
    #[error("delivery hours must be between {min} and {max}")]
    HoursOutOfRange { min: Decimal, max: Decimal },
    #[error("delivery hours must be positive")]
    NonPositiveHours,
    #[error("a description is required")]
    DescriptionRequired,
    #[error("a comment is required for this action")]
    CommentRequired,
    #[error("task type is not payable under Schedule 1")]
    UnsupportedTaskType,
    #[error("contemporaneous marking is covered by tutorial associated hours")]
    ContemporaneousMarkingNotPayable,
    #[error("no enterprise agreement rate covers the requested work")]
    PolicyNotFound,
    #[error("a timesheet already exists for this tutor, course, and week")]
    DuplicateTimesheet,
    #[error("the course budget cannot cover this timesheet")]
    BudgetExceeded,
    #[error("timesheet is not editable in its current status")]
    NotEditable,
    #[error("action is not valid from the current status")]
    InvalidTransition { allowed: Vec<ApprovalAction> },
    #[error("timesheet was modified concurrently, retry with fresh state")]
    ConcurrentModification,
    #[error("not authorized: {0}")]
    AuthorizationFailed(String),
    #[error("resource not found")]
    ResourceNotFound,
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ServiceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_FAILED",
            ServiceError::InvalidTutorialDelivery => "INVALID_TUTORIAL_DELIVERY",
            ServiceError::WeekNotMonday => "WEEK_NOT_MONDAY",
            ServiceError::WeekInFuture => "WEEK_IN_FUTURE",
            ServiceError::HoursOutOfRange { .. } => "HOURS_OUT_OF_RANGE",
            ServiceError::NonPositiveHours => "NON_POSITIVE_HOURS",
            ServiceError::DescriptionRequired => "DESCRIPTION_REQUIRED",
            ServiceError::CommentRequired => "COMMENT_REQUIRED",
            ServiceError::UnsupportedTaskType => "UNSUPPORTED_TASK_TYPE",
            ServiceError::ContemporaneousMarkingNotPayable => {
                "CONTEMPORANEOUS_MARKING_NOT_PAYABLE"
            }
            ServiceError::PolicyNotFound => "POLICY_NOT_FOUND",
            ServiceError::DuplicateTimesheet => "DUPLICATE_TIMESHEET",
            ServiceError::BudgetExceeded => "BUDGET_EXCEEDED",
            ServiceError::NotEditable => "NOT_EDITABLE",
            ServiceError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ServiceError::ConcurrentModification => "CONCURRENT_MODIFICATION",
            ServiceError::AuthorizationFailed(_) => "AUTHORIZATION_FAILED",
            ServiceError::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ServiceError::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_)
            | ServiceError::InvalidTutorialDelivery
            | ServiceError::WeekNotMonday
            | ServiceError::WeekInFuture
            | ServiceError::HoursOutOfRange { .. }
            | ServiceError::NonPositiveHours
            | ServiceError::DescriptionRequired
            | ServiceError::CommentRequired
            | ServiceError::UnsupportedTaskType
            | ServiceError::ContemporaneousMarkingNotPayable => StatusCode::BAD_REQUEST,
            ServiceError::PolicyNotFound
            | ServiceError::BudgetExceeded
            | ServiceError::NotEditable
            | ServiceError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::DuplicateTimesheet | ServiceError::ConcurrentModification => {
                StatusCode::CONFLICT
            }
            ServiceError::AuthorizationFailed(_) => StatusCode::FORBIDDEN,
            ServiceError::ResourceNotFound => StatusCode::NOT_FOUND,
            ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Expected outcomes of user interaction; not logged as errors.
    pub fn is_expected(&self) -> bool {
        !matches!(self, ServiceError::Persistence(_))
    }
}

impl From<CalculationError> for ServiceError {
    fn from(err: CalculationError) -> Self {
        match err {
            CalculationError::PolicyNotFound(_) => ServiceError::PolicyNotFound,
            CalculationError::InvalidTutorialDelivery => ServiceError::InvalidTutorialDelivery,
            CalculationError::UnsupportedTaskType => ServiceError::UnsupportedTaskType,
            CalculationError::ContemporaneousMarkingNotPayable => {
                ServiceError::ContemporaneousMarkingNotPayable
            }
            CalculationError::NonPositiveHours => ServiceError::NonPositiveHours,
        }
    }
}

impl From<PermissionDenied> for ServiceError {
    fn from(err: PermissionDenied) -> Self {
        ServiceError::AuthorizationFailed(err.0.to_string())
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ServiceError::ResourceNotFound,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                ServiceError::DuplicateTimesheet
            }
            _ => ServiceError::Persistence(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "invalid value".to_string());
                    FieldError::new(field, message)
                })
            })
            .collect();
        ServiceError::Validation(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            ServiceError::Validation(Vec::new()).error_code(),
            "VALIDATION_FAILED"
        );
        assert_eq!(ServiceError::PolicyNotFound.error_code(), "POLICY_NOT_FOUND");
        assert_eq!(
            ServiceError::ConcurrentModification.error_code(),
            "CONCURRENT_MODIFICATION"
        );
        assert_eq!(
            ServiceError::Persistence("boom".into()).error_code(),
            "PERSISTENCE_FAILURE"
        );
    }

    #[test]
    fn http_mapping_follows_the_contract() {
        assert_eq!(
            ServiceError::WeekNotMonday.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::HoursOutOfRange {
                min: dec!(0.1),
                max: dec!(40.0)
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::BudgetExceeded.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::DuplicateTimesheet.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::AuthorizationFailed("no".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::ResourceNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Persistence("db down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn row_not_found_maps_to_resource_not_found() {
        let err = ServiceError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, ServiceError::ResourceNotFound));
    }
}
