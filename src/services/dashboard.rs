//! Per-role dashboard aggregates behind `GET /dashboard/summary`.
//!
//! Tutors get their own workload and pay totals; lecturers add budget usage
//! over their courses (optionally narrowed to one); admins see the system
//! plus tutor counts. Course filtering is a lecturer/admin capability and
//! lecturer ownership is verified against persistence before any data is
//! aggregated.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        models::{Role, TimesheetStatus},
        permissions, week,
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    repository::{
        courses::CourseRepository,
        timesheets::{Scope, TimesheetRepository},
        users::{TutorCounts, UserRepository},
    },
};

use super::errors::ServiceError;

/// Query string of `GET /dashboard/summary`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    pub course_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSummary {
    pub current_week_hours: Decimal,
    pub previous_week_hours: Decimal,
    pub average_weekly_hours: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetUsage {
    pub allocated: Decimal,
    pub used: Decimal,
    pub remaining: Decimal,
    pub utilization_percent: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorCountsView {
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_timesheets: i64,
    pub pending_confirmations: i64,
    pub total_hours: Decimal,
    pub total_pay: Decimal,
    pub this_week_hours: Decimal,
    pub this_week_pay: Decimal,
    pub status_breakdown: BTreeMap<&'static str, i64>,
    pub workload: WorkloadSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tutors: Option<TutorCountsView>,
}

pub struct DashboardService {
    state: Arc<AppState>,
}

impl DashboardService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn summary(
        &self,
        actor: &AuthenticatedUser,
        query: DashboardQuery,
    ) -> Result<DashboardSummary, ServiceError> {
        if let Some(course_id) = query.course_id {
            permissions::can_filter_dashboard_by_course(actor.role)?;
            if actor.role == Role::Lecturer
                && !CourseRepository::exists_by_id_and_lecturer(
                    &self.state.pool,
                    course_id,
                    actor.user_id,
                )
                .await?
            {
                return Err(ServiceError::AuthorizationFailed(
                    "course is not owned by this lecturer".into(),
                ));
            }
            if CourseRepository::find_by_id(&self.state.pool, course_id)
                .await?
                .is_none()
            {
                return Err(ServiceError::ResourceNotFound);
            }
        }

        let scope = match actor.role {
            Role::Tutor => Scope::Tutor(actor.user_id),
            Role::Lecturer => query
                .course_id
                .map(Scope::Course)
                .unwrap_or(Scope::Lecturer(actor.user_id)),
            Role::Admin => query
                .course_id
                .map(Scope::Course)
                .unwrap_or(Scope::System),
        };

        let pool = &self.state.pool;
        let aggregate =
            TimesheetRepository::aggregate(pool, scope, query.start_date, query.end_date).await?;
        let breakdown =
            TimesheetRepository::status_breakdown(pool, scope, query.start_date, query.end_date)
                .await?;

        let this_monday = week::current_monday();
        let previous_monday = this_monday - Duration::days(7);
        let (this_week_hours, this_week_pay) =
            TimesheetRepository::week_totals(pool, scope, this_monday).await?;
        let (previous_week_hours, _) =
            TimesheetRepository::week_totals(pool, scope, previous_monday).await?;
        let weeks =
            TimesheetRepository::distinct_weeks(pool, scope, query.start_date, query.end_date)
                .await?;
        let average_weekly_hours = if weeks > 0 {
            (aggregate.total_hours / Decimal::from(weeks)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        let pending_status = match actor.role {
            Role::Tutor => TimesheetStatus::PendingTutorConfirmation,
            Role::Lecturer => TimesheetStatus::TutorConfirmed,
            Role::Admin => TimesheetStatus::LecturerConfirmed,
        };
        let pending_confirmations =
            TimesheetRepository::count_with_status(pool, scope, pending_status).await?;

        let budget = match actor.role {
            Role::Tutor => None,
            Role::Lecturer => Some(
                self.budget_usage(Some(actor.user_id), query.course_id)
                    .await?,
            ),
            Role::Admin => Some(self.budget_usage(None, query.course_id).await?),
        };

        let tutors = if actor.role == Role::Admin {
            let TutorCounts { total, active } = UserRepository::tutor_counts(pool).await?;
            Some(TutorCountsView { total, active })
        } else {
            None
        };

        let status_breakdown = breakdown
            .into_iter()
            .map(|(status, count)| (status.wire_name(), count))
            .collect();

        Ok(DashboardSummary {
            total_timesheets: aggregate.total_count,
            pending_confirmations,
            total_hours: aggregate.total_hours,
            total_pay: aggregate.total_amount,
            this_week_hours,
            this_week_pay,
            status_breakdown,
            workload: WorkloadSummary {
                current_week_hours: this_week_hours,
                previous_week_hours,
                average_weekly_hours,
            },
            budget,
            tutors,
        })
    }

    async fn budget_usage(
        &self,
        lecturer_id: Option<i64>,
        course_id: Option<i64>,
    ) -> Result<BudgetUsage, ServiceError> {
        let totals =
            CourseRepository::budget_totals(&self.state.pool, lecturer_id, course_id).await?;
        let utilization_percent = if totals.allocated > Decimal::ZERO {
            (totals.used / totals.allocated * dec!(100))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        } else {
            Decimal::ZERO
        };
        Ok(BudgetUsage {
            allocated: totals.allocated,
            used: totals.used,
            remaining: totals.allocated - totals.used,
            utilization_percent,
        })
    }
}
