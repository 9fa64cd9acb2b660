//! Timesheet persistence.
//!
//! All writes go through version-checked statements so concurrent writers
//! surface as zero-row updates rather than lost work. History rows are
//! insert-only. Methods take any Postgres executor so services can run them
//! against the pool or inside a transaction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, QueryBuilder, Row};

use crate::domain::models::{ApprovalHistoryEntry, Timesheet, TimesheetStatus};

const TIMESHEET_COLUMNS: &str = "t.id, t.tutor_id, t.course_id, t.week_start, t.task_type, \
     t.qualification, t.repeat_session, t.delivery_hours, t.associated_hours, t.hourly_rate, \
     t.amount, t.rate_code, t.clause_reference, t.formula, t.description, t.status, \
     t.rejection_reason, t.created_by, t.version, t.created_at, t.updated_at";

/// Which slice of the timesheet table a query covers.
#[derive(Debug, Clone, Copy)]
pub enum Scope {
    Tutor(i64),
    /// Every course owned by this lecturer.
    Lecturer(i64),
    Course(i64),
    System,
}

impl Scope {
    fn needs_course_join(&self) -> bool {
        matches!(self, Scope::Lecturer(_))
    }

    fn push_predicate<'a>(&self, builder: &mut QueryBuilder<'a, sqlx::Postgres>) {
        match *self {
            Scope::Tutor(id) => {
                builder.push(" AND t.tutor_id = ").push_bind(id);
            }
            Scope::Lecturer(id) => {
                builder.push(" AND c.lecturer_id = ").push_bind(id);
            }
            Scope::Course(id) => {
                builder.push(" AND t.course_id = ").push_bind(id);
            }
            Scope::System => {}
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimesheetFilter {
    pub tutor_id: Option<i64>,
    pub course_id: Option<i64>,
    pub status: Option<TimesheetStatus>,
    pub week_from: Option<NaiveDate>,
    pub week_to: Option<NaiveDate>,
    /// When set, restricts results to courses owned by this lecturer.
    pub lecturer_scope: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimesheetAggregate {
    pub total_count: i64,
    pub total_hours: Decimal,
    pub total_amount: Decimal,
}

pub struct TimesheetRepository;

impl TimesheetRepository {
    pub async fn insert(
        executor: impl PgExecutor<'_>,
        sheet: &Timesheet,
    ) -> Result<Timesheet, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO timesheets (tutor_id, course_id, week_start, task_type, qualification, \
             repeat_session, delivery_hours, associated_hours, hourly_rate, amount, rate_code, \
             clause_reference, formula, description, status, rejection_reason, created_by, \
             version, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20)
             RETURNING id",
        )
        .bind(sheet.tutor_id)
        .bind(sheet.course_id)
        .bind(sheet.week_start)
        .bind(sheet.task_type.as_str())
        .bind(sheet.qualification.as_str())
        .bind(sheet.repeat_session)
        .bind(sheet.delivery_hours)
        .bind(sheet.associated_hours)
        .bind(sheet.hourly_rate)
        .bind(sheet.amount)
        .bind(&sheet.rate_code)
        .bind(&sheet.clause_reference)
        .bind(&sheet.formula)
        .bind(&sheet.description)
        .bind(sheet.status.as_str())
        .bind(&sheet.rejection_reason)
        .bind(sheet.created_by)
        .bind(sheet.version)
        .bind(sheet.created_at)
        .bind(sheet.updated_at)
        .fetch_one(executor)
        .await?;

        let mut saved = sheet.clone();
        saved.id = id;
        Ok(saved)
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: i64,
    ) -> Result<Option<Timesheet>, sqlx::Error> {
        let query = format!("SELECT {TIMESHEET_COLUMNS} FROM timesheets t WHERE t.id = $1");
        let row = sqlx::query(&query).bind(id).fetch_optional(executor).await?;
        row.map(map_timesheet).transpose()
    }

    /// Row-locked load for approval application.
    pub async fn find_by_id_for_update(
        executor: impl PgExecutor<'_>,
        id: i64,
    ) -> Result<Option<Timesheet>, sqlx::Error> {
        let query =
            format!("SELECT {TIMESHEET_COLUMNS} FROM timesheets t WHERE t.id = $1 FOR UPDATE");
        let row = sqlx::query(&query).bind(id).fetch_optional(executor).await?;
        row.map(map_timesheet).transpose()
    }

    pub async fn exists_for_week(
        executor: impl PgExecutor<'_>,
        tutor_id: i64,
        course_id: i64,
        week_start: NaiveDate,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM timesheets WHERE tutor_id = $1 AND course_id = $2 AND week_start = $3",
        )
        .bind(tutor_id)
        .bind(course_id)
        .bind(week_start)
        .fetch_one(executor)
        .await?;
        Ok(count > 0)
    }

    /// Writes the sheet back if its stored version still matches
    /// `expected_version`. Returns false on a lost race.
    pub async fn update(
        executor: impl PgExecutor<'_>,
        sheet: &Timesheet,
        expected_version: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE timesheets SET week_start=$1, task_type=$2, qualification=$3, \
             repeat_session=$4, delivery_hours=$5, associated_hours=$6, hourly_rate=$7, \
             amount=$8, rate_code=$9, clause_reference=$10, formula=$11, description=$12, \
             status=$13, rejection_reason=$14, version=$15, updated_at=$16
             WHERE id = $17 AND version = $18",
        )
        .bind(sheet.week_start)
        .bind(sheet.task_type.as_str())
        .bind(sheet.qualification.as_str())
        .bind(sheet.repeat_session)
        .bind(sheet.delivery_hours)
        .bind(sheet.associated_hours)
        .bind(sheet.hourly_rate)
        .bind(sheet.amount)
        .bind(&sheet.rate_code)
        .bind(&sheet.clause_reference)
        .bind(&sheet.formula)
        .bind(&sheet.description)
        .bind(sheet.status.as_str())
        .bind(&sheet.rejection_reason)
        .bind(sheet.version)
        .bind(sheet.updated_at)
        .bind(sheet.id)
        .bind(expected_version)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete(executor: impl PgExecutor<'_>, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM timesheets WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn insert_history(
        executor: impl PgExecutor<'_>,
        entry: &ApprovalHistoryEntry,
    ) -> Result<ApprovalHistoryEntry, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO approval_history (timesheet_id, action, from_status, to_status, \
             actor_id, actor_role, comment, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
             RETURNING id",
        )
        .bind(entry.timesheet_id)
        .bind(entry.action.as_str())
        .bind(entry.from_status.as_str())
        .bind(entry.to_status.as_str())
        .bind(entry.actor_id)
        .bind(entry.actor_role.as_str())
        .bind(&entry.comment)
        .bind(entry.created_at)
        .fetch_one(executor)
        .await?;

        let mut saved = entry.clone();
        saved.id = id;
        Ok(saved)
    }

    pub async fn history(
        executor: impl PgExecutor<'_>,
        timesheet_id: i64,
    ) -> Result<Vec<ApprovalHistoryEntry>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, timesheet_id, action, from_status, to_status, actor_id, actor_role, \
             comment, created_at
             FROM approval_history WHERE timesheet_id = $1
             ORDER BY created_at ASC, id ASC",
        )
        .bind(timesheet_id)
        .fetch_all(executor)
        .await?;
        rows.into_iter().map(map_history_entry).collect()
    }

    pub async fn list(
        executor: impl PgExecutor<'_>,
        filter: &TimesheetFilter,
        page: Page,
    ) -> Result<Vec<Timesheet>, sqlx::Error> {
        let mut builder = QueryBuilder::new(format!("SELECT {TIMESHEET_COLUMNS} FROM timesheets t"));
        if filter.lecturer_scope.is_some() {
            builder.push(" JOIN courses c ON c.id = t.course_id");
        }
        builder.push(" WHERE 1 = 1");
        if let Some(lecturer_id) = filter.lecturer_scope {
            builder.push(" AND c.lecturer_id = ").push_bind(lecturer_id);
        }
        if let Some(tutor_id) = filter.tutor_id {
            builder.push(" AND t.tutor_id = ").push_bind(tutor_id);
        }
        if let Some(course_id) = filter.course_id {
            builder.push(" AND t.course_id = ").push_bind(course_id);
        }
        if let Some(status) = filter.status {
            builder.push(" AND t.status = ").push_bind(status.as_str());
        }
        if let Some(week_from) = filter.week_from {
            builder.push(" AND t.week_start >= ").push_bind(week_from);
        }
        if let Some(week_to) = filter.week_to {
            builder.push(" AND t.week_start <= ").push_bind(week_to);
        }
        builder
            .push(" ORDER BY t.created_at DESC, t.id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = builder.build().fetch_all(executor).await?;
        rows.into_iter().map(map_timesheet).collect()
    }

    pub async fn pending_for_tutor(
        executor: impl PgExecutor<'_>,
        tutor_id: i64,
    ) -> Result<Vec<Timesheet>, sqlx::Error> {
        let query = format!(
            "SELECT {TIMESHEET_COLUMNS} FROM timesheets t \
             WHERE t.tutor_id = $1 AND t.status = $2 \
             ORDER BY t.created_at DESC, t.id DESC"
        );
        let rows = sqlx::query(&query)
            .bind(tutor_id)
            .bind(TimesheetStatus::PendingTutorConfirmation.as_str())
            .fetch_all(executor)
            .await?;
        rows.into_iter().map(map_timesheet).collect()
    }

    pub async fn pending_for_lecturer(
        executor: impl PgExecutor<'_>,
        lecturer_id: i64,
    ) -> Result<Vec<Timesheet>, sqlx::Error> {
        let query = format!(
            "SELECT {TIMESHEET_COLUMNS} FROM timesheets t \
             JOIN courses c ON c.id = t.course_id \
             WHERE c.lecturer_id = $1 AND t.status = $2 \
             ORDER BY t.created_at DESC, t.id DESC"
        );
        let rows = sqlx::query(&query)
            .bind(lecturer_id)
            .bind(TimesheetStatus::TutorConfirmed.as_str())
            .fetch_all(executor)
            .await?;
        rows.into_iter().map(map_timesheet).collect()
    }

    pub async fn pending_for_admin(
        executor: impl PgExecutor<'_>,
    ) -> Result<Vec<Timesheet>, sqlx::Error> {
        let query = format!(
            "SELECT {TIMESHEET_COLUMNS} FROM timesheets t WHERE t.status = $1 \
             ORDER BY t.created_at DESC, t.id DESC"
        );
        let rows = sqlx::query(&query)
            .bind(TimesheetStatus::LecturerConfirmed.as_str())
            .fetch_all(executor)
            .await?;
        rows.into_iter().map(map_timesheet).collect()
    }

    pub async fn aggregate(
        executor: impl PgExecutor<'_>,
        scope: Scope,
        week_from: Option<NaiveDate>,
        week_to: Option<NaiveDate>,
    ) -> Result<TimesheetAggregate, sqlx::Error> {
        let mut builder = QueryBuilder::new(
            "SELECT COUNT(*) AS total_count, \
             COALESCE(SUM(t.delivery_hours + t.associated_hours), 0) AS total_hours, \
             COALESCE(SUM(t.amount), 0) AS total_amount \
             FROM timesheets t",
        );
        push_scope_and_range(&mut builder, scope, week_from, week_to);

        let row = builder.build().fetch_one(executor).await?;
        Ok(TimesheetAggregate {
            total_count: row.try_get("total_count")?,
            total_hours: row.try_get("total_hours")?,
            total_amount: row.try_get("total_amount")?,
        })
    }

    pub async fn status_breakdown(
        executor: impl PgExecutor<'_>,
        scope: Scope,
        week_from: Option<NaiveDate>,
        week_to: Option<NaiveDate>,
    ) -> Result<Vec<(TimesheetStatus, i64)>, sqlx::Error> {
        let mut builder =
            QueryBuilder::new("SELECT t.status AS status, COUNT(*) AS status_count FROM timesheets t");
        push_scope_and_range(&mut builder, scope, week_from, week_to);
        builder.push(" GROUP BY t.status");

        let rows = builder.build().fetch_all(executor).await?;
        rows.into_iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                let status = status
                    .parse::<TimesheetStatus>()
                    .map_err(|err| sqlx::Error::Decode(err.into()))?;
                let count: i64 = row.try_get("status_count")?;
                Ok((status, count))
            })
            .collect()
    }

    /// Hours and pay for one anchored week.
    pub async fn week_totals(
        executor: impl PgExecutor<'_>,
        scope: Scope,
        week_start: NaiveDate,
    ) -> Result<(Decimal, Decimal), sqlx::Error> {
        let mut builder = QueryBuilder::new(
            "SELECT COALESCE(SUM(t.delivery_hours + t.associated_hours), 0) AS week_hours, \
             COALESCE(SUM(t.amount), 0) AS week_pay \
             FROM timesheets t",
        );
        push_scope_and_range(&mut builder, scope, Some(week_start), Some(week_start));

        let row = builder.build().fetch_one(executor).await?;
        Ok((row.try_get("week_hours")?, row.try_get("week_pay")?))
    }

    pub async fn distinct_weeks(
        executor: impl PgExecutor<'_>,
        scope: Scope,
        week_from: Option<NaiveDate>,
        week_to: Option<NaiveDate>,
    ) -> Result<i64, sqlx::Error> {
        let mut builder =
            QueryBuilder::new("SELECT COUNT(DISTINCT t.week_start) AS weeks FROM timesheets t");
        push_scope_and_range(&mut builder, scope, week_from, week_to);

        let row = builder.build().fetch_one(executor).await?;
        row.try_get("weeks")
    }

    pub async fn count_with_status(
        executor: impl PgExecutor<'_>,
        scope: Scope,
        status: TimesheetStatus,
    ) -> Result<i64, sqlx::Error> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) AS pending FROM timesheets t");
        push_scope_and_range(&mut builder, scope, None, None);
        builder.push(" AND t.status = ").push_bind(status.as_str());

        let row = builder.build().fetch_one(executor).await?;
        row.try_get("pending")
    }
}

fn push_scope_and_range(
    builder: &mut QueryBuilder<'_, sqlx::Postgres>,
    scope: Scope,
    week_from: Option<NaiveDate>,
    week_to: Option<NaiveDate>,
) {
    if scope.needs_course_join() {
        builder.push(" JOIN courses c ON c.id = t.course_id");
    }
    builder.push(" WHERE 1 = 1");
    scope.push_predicate(builder);
    if let Some(from) = week_from {
        builder.push(" AND t.week_start >= ").push_bind(from);
    }
    if let Some(to) = week_to {
        builder.push(" AND t.week_start <= ").push_bind(to);
    }
}

fn map_timesheet(row: PgRow) -> Result<Timesheet, sqlx::Error> {
    let task_type: String = row.try_get("task_type")?;
    let qualification: String = row.try_get("qualification")?;
    let status: String = row.try_get("status")?;
    Ok(Timesheet {
        id: row.try_get("id")?,
        tutor_id: row.try_get("tutor_id")?,
        course_id: row.try_get("course_id")?,
        week_start: row.try_get("week_start")?,
        task_type: task_type
            .parse()
            .map_err(|err: String| sqlx::Error::Decode(err.into()))?,
        qualification: qualification
            .parse()
            .map_err(|err: String| sqlx::Error::Decode(err.into()))?,
        repeat_session: row.try_get("repeat_session")?,
        delivery_hours: row.try_get("delivery_hours")?,
        associated_hours: row.try_get("associated_hours")?,
        hourly_rate: row.try_get("hourly_rate")?,
        amount: row.try_get("amount")?,
        rate_code: row.try_get("rate_code")?,
        clause_reference: row.try_get("clause_reference")?,
        formula: row.try_get("formula")?,
        description: row.try_get("description")?,
        status: status
            .parse()
            .map_err(|err: String| sqlx::Error::Decode(err.into()))?,
        rejection_reason: row.try_get("rejection_reason")?,
        created_by: row.try_get("created_by")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_history_entry(row: PgRow) -> Result<ApprovalHistoryEntry, sqlx::Error> {
    let action: String = row.try_get("action")?;
    let from_status: String = row.try_get("from_status")?;
    let to_status: String = row.try_get("to_status")?;
    let actor_role: String = row.try_get("actor_role")?;
    Ok(ApprovalHistoryEntry {
        id: row.try_get("id")?,
        timesheet_id: row.try_get("timesheet_id")?,
        action: action
            .parse()
            .map_err(|err: String| sqlx::Error::Decode(err.into()))?,
        from_status: from_status
            .parse()
            .map_err(|err: String| sqlx::Error::Decode(err.into()))?,
        to_status: to_status
            .parse()
            .map_err(|err: String| sqlx::Error::Decode(err.into()))?,
        actor_id: row.try_get("actor_id")?,
        actor_role: actor_role
            .parse()
            .map_err(|err: String| sqlx::Error::Decode(err.into()))?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
    })
}
