//! Schedule 1 reference rows, read once at startup (and on admin reload)
//! into the in-memory policy snapshot.

use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};

use crate::domain::policy::PolicyRow;

pub struct PolicyRepository;

impl PolicyRepository {
    pub async fn load_all(executor: impl PgExecutor<'_>) -> Result<Vec<PolicyRow>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT task_type, qualification, repeat_session, effective_from, effective_to, \
             rate_code, hourly_rate, associated_hours_cap, clause_reference, formula_template \
             FROM policy_rows ORDER BY id",
        )
        .fetch_all(executor)
        .await?;
        rows.into_iter().map(map_policy_row).collect()
    }
}

fn map_policy_row(row: PgRow) -> Result<PolicyRow, sqlx::Error> {
    let task_type: String = row.try_get("task_type")?;
    let qualification: String = row.try_get("qualification")?;
    Ok(PolicyRow {
        task_type: task_type
            .parse()
            .map_err(|err: String| sqlx::Error::Decode(err.into()))?,
        qualification: qualification
            .parse()
            .map_err(|err: String| sqlx::Error::Decode(err.into()))?,
        repeat_session: row.try_get("repeat_session")?,
        effective_from: row.try_get("effective_from")?,
        effective_to: row.try_get("effective_to")?,
        rate_code: row.try_get("rate_code")?,
        hourly_rate: row.try_get("hourly_rate")?,
        associated_hours_cap: row.try_get("associated_hours_cap")?,
        clause_reference: row.try_get("clause_reference")?,
        formula_template: row.try_get("formula_template")?,
    })
}
