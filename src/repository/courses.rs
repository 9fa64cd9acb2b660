//! Course persistence, including the budget-used counter that moves in the
//! same transaction as any status change crossing the counted boundary.

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};

use crate::domain::models::Course;

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetTotals {
    pub allocated: Decimal,
    pub used: Decimal,
}

pub struct CourseRepository;

impl CourseRepository {
    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: i64,
    ) -> Result<Option<Course>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, code, name, lecturer_id, budget_allocated, budget_used, active \
             FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(row.map(map_course))
    }

    /// Locked load so budget checks and adjustments serialize per course.
    pub async fn find_by_id_for_update(
        executor: impl PgExecutor<'_>,
        id: i64,
    ) -> Result<Option<Course>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, code, name, lecturer_id, budget_allocated, budget_used, active \
             FROM courses WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(row.map(map_course))
    }

    pub async fn exists_by_id_and_lecturer(
        executor: impl PgExecutor<'_>,
        course_id: i64,
        lecturer_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM courses WHERE id = $1 AND lecturer_id = $2")
                .bind(course_id)
                .bind(lecturer_id)
                .fetch_one(executor)
                .await?;
        Ok(count > 0)
    }

    pub async fn adjust_budget_used(
        executor: impl PgExecutor<'_>,
        course_id: i64,
        delta: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE courses SET budget_used = budget_used + $1 WHERE id = $2")
            .bind(delta)
            .bind(course_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Allocated/used sums over active courses, optionally narrowed to one
    /// lecturer or one course.
    pub async fn budget_totals(
        executor: impl PgExecutor<'_>,
        lecturer_id: Option<i64>,
        course_id: Option<i64>,
    ) -> Result<BudgetTotals, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::new(
            "SELECT COALESCE(SUM(budget_allocated), 0) AS allocated, \
             COALESCE(SUM(budget_used), 0) AS used \
             FROM courses WHERE active = TRUE",
        );
        if let Some(lecturer_id) = lecturer_id {
            builder.push(" AND lecturer_id = ").push_bind(lecturer_id);
        }
        if let Some(course_id) = course_id {
            builder.push(" AND id = ").push_bind(course_id);
        }

        let row = builder.build().fetch_one(executor).await?;
        Ok(BudgetTotals {
            allocated: row.try_get("allocated")?,
            used: row.try_get("used")?,
        })
    }
}

fn map_course(row: PgRow) -> Course {
    Course {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        lecturer_id: row.get("lecturer_id"),
        budget_allocated: row.get("budget_allocated"),
        budget_used: row.get("budget_used"),
        active: row.get("active"),
    }
}
