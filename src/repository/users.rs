//! User lookups against the collaborator identity store.

use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};

use crate::domain::models::{Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TutorCounts {
    pub total: i64,
    pub active: i64,
}

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: i64,
    ) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, email, display_name, role, active FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        row.map(map_user).transpose()
    }

    pub async fn tutor_counts(executor: impl PgExecutor<'_>) -> Result<TutorCounts, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE active) AS active \
             FROM users WHERE role = $1",
        )
        .bind(Role::Tutor.as_str())
        .fetch_one(executor)
        .await?;
        Ok(TutorCounts {
            total: row.try_get("total")?,
            active: row.try_get("active")?,
        })
    }
}

fn map_user(row: PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        role: role
            .parse()
            .map_err(|err: String| sqlx::Error::Decode(err.into()))?,
        active: row.try_get("active")?,
    })
}
