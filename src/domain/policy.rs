//! Schedule 1 rate resolution.
//!
//! The enterprise agreement is represented as a table of dated rate rows
//! loaded once at startup and swapped atomically on reload. Lookup is an
//! exact key match on (task type, qualification, repeat flag) narrowed to
//! the single row whose `[effective_from, effective_to)` window contains the
//! session date; overlapping windows for one key are a configuration error
//! and are refused at load.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::{Qualification, TaskType};

/// One dated Schedule 1 rate line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyRow {
    pub task_type: TaskType,
    pub qualification: Qualification,
    /// `None` applies to either repeat flag. Tutorial rows pin the flag and
    /// carry that variant's associated-hours cap.
    pub repeat_session: Option<bool>,
    pub effective_from: NaiveDate,
    /// Exclusive; `None` is open-ended.
    pub effective_to: Option<NaiveDate>,
    pub rate_code: String,
    pub hourly_rate: Decimal,
    pub associated_hours_cap: Option<Decimal>,
    pub clause_reference: String,
    pub formula_template: String,
}

impl PolicyRow {
    fn covers(&self, date: NaiveDate) -> bool {
        date >= self.effective_from && self.effective_to.map(|to| date < to).unwrap_or(true)
    }

    fn matches(&self, task_type: TaskType, qualification: Qualification, repeat: bool) -> bool {
        self.task_type == task_type
            && self.qualification == qualification
            && self.repeat_session.map(|r| r == repeat).unwrap_or(true)
    }

    fn key_overlaps(&self, other: &PolicyRow) -> bool {
        if self.task_type != other.task_type || self.qualification != other.qualification {
            return false;
        }
        let repeat_overlaps = match (self.repeat_session, other.repeat_session) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        if !repeat_overlaps {
            return false;
        }
        let self_open = self.effective_to.map(|to| other.effective_from < to);
        let other_open = other.effective_to.map(|to| self.effective_from < to);
        self_open.unwrap_or(true) && other_open.unwrap_or(true)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no active policy row for {task_type:?}/{qualification:?} (repeat={repeat}) on {date}")]
pub struct PolicyNotFound {
    pub task_type: TaskType,
    pub qualification: Qualification,
    pub repeat: bool,
    pub date: NaiveDate,
}

#[derive(Debug, Error)]
#[error("overlapping policy rows for {task_type:?}/{qualification:?}: {first} and {second}")]
pub struct PolicyConfigError {
    pub task_type: TaskType,
    pub qualification: Qualification,
    pub first: String,
    pub second: String,
}

/// Immutable snapshot of the rate table.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    rows: Vec<PolicyRow>,
}

impl PolicyTable {
    /// Validates the row set and builds a snapshot. Two rows with an
    /// intersecting key and date window are refused.
    pub fn new(rows: Vec<PolicyRow>) -> Result<Self, PolicyConfigError> {
        for (i, row) in rows.iter().enumerate() {
            for other in rows.iter().skip(i + 1) {
                if row.key_overlaps(other) {
                    return Err(PolicyConfigError {
                        task_type: row.task_type,
                        qualification: row.qualification,
                        first: row.rate_code.clone(),
                        second: other.rate_code.clone(),
                    });
                }
            }
        }
        Ok(Self { rows })
    }

    pub fn resolve(
        &self,
        task_type: TaskType,
        qualification: Qualification,
        repeat: bool,
        session_date: NaiveDate,
    ) -> Result<&PolicyRow, PolicyNotFound> {
        self.rows
            .iter()
            .find(|row| row.matches(task_type, qualification, repeat) && row.covers(session_date))
            .ok_or(PolicyNotFound {
                task_type,
                qualification,
                repeat,
                date: session_date,
            })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Shared policy cache. Readers take a cheap snapshot; an admin reload
/// builds a fresh table and flips the pointer.
pub struct PolicyStore {
    table: RwLock<Arc<PolicyTable>>,
}

impl PolicyStore {
    pub fn new(table: PolicyTable) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
        }
    }

    pub fn snapshot(&self) -> Arc<PolicyTable> {
        Arc::clone(&self.table.read())
    }

    pub fn replace(&self, table: PolicyTable) {
        *self.table.write() = Arc::new(table);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use rust_decimal_macros::dec;

    fn ea_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    fn tutorial_row(
        qualification: Qualification,
        repeat: bool,
        rate_code: &str,
        hourly_rate: Decimal,
        cap: Decimal,
        clause: &str,
    ) -> PolicyRow {
        PolicyRow {
            task_type: TaskType::Tutorial,
            qualification,
            repeat_session: Some(repeat),
            effective_from: ea_start(),
            effective_to: None,
            rate_code: rate_code.to_string(),
            hourly_rate,
            associated_hours_cap: Some(cap),
            clause_reference: clause.to_string(),
            formula_template: "1h delivery + {associated}h associated @ {rate}".to_string(),
        }
    }

    fn hourly_row(
        task_type: TaskType,
        qualification: Qualification,
        rate_code: &str,
        hourly_rate: Decimal,
        clause: &str,
    ) -> PolicyRow {
        PolicyRow {
            task_type,
            qualification,
            repeat_session: None,
            effective_from: ea_start(),
            effective_to: None,
            rate_code: rate_code.to_string(),
            hourly_rate,
            associated_hours_cap: None,
            clause_reference: clause.to_string(),
            formula_template: "{delivery}h @ {rate}".to_string(),
        }
    }

    /// Mirrors the seeded `policy_rows` reference data.
    pub(crate) fn schedule_1() -> PolicyTable {
        let mut rows = vec![
            tutorial_row(Qualification::Standard, false, "TU2", dec!(58.6467), dec!(2.0), "Schedule 1, Item 1(b)"),
            tutorial_row(Qualification::Phd, false, "TU1", dec!(69.6367), dec!(2.0), "Schedule 1, Item 1(a)"),
            tutorial_row(Qualification::Coordinator, false, "TU1", dec!(69.6367), dec!(2.0), "Schedule 1, Item 1(a)"),
            tutorial_row(Qualification::Standard, true, "TU4", dec!(58.6467), dec!(1.0), "Schedule 1, Item 1(d)"),
            tutorial_row(Qualification::Phd, true, "TU3", dec!(69.6367), dec!(1.0), "Schedule 1, Item 1(c)"),
            tutorial_row(Qualification::Coordinator, true, "TU3", dec!(69.6367), dec!(1.0), "Schedule 1, Item 1(c)"),
        ];
        for qualification in [
            Qualification::Standard,
            Qualification::Phd,
            Qualification::Coordinator,
        ] {
            rows.push(hourly_row(TaskType::Lecture, qualification, "LE1", dec!(163.87), "Schedule 1, Item 2"));
            rows.push(hourly_row(TaskType::Marking, qualification, "MK1", dec!(45.00), "Schedule 1, Item 3"));
        }
        rows.push(hourly_row(TaskType::Demo, Qualification::Standard, "DE2", dec!(45.45), "Schedule 1, Item 4"));
        rows.push(hourly_row(TaskType::Demo, Qualification::Phd, "DE1", dec!(54.17), "Schedule 1, Item 4"));
        rows.push(hourly_row(TaskType::Demo, Qualification::Coordinator, "DE1", dec!(54.17), "Schedule 1, Item 4"));
        rows.push(hourly_row(TaskType::Oraa, Qualification::Standard, "AO2", dec!(45.45), "Schedule 1, Item 5"));
        rows.push(hourly_row(TaskType::Oraa, Qualification::Phd, "AO1", dec!(54.17), "Schedule 1, Item 5"));
        rows.push(hourly_row(TaskType::Oraa, Qualification::Coordinator, "AO1", dec!(54.17), "Schedule 1, Item 5"));

        PolicyTable::new(rows).expect("reference schedule must not overlap")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn resolves_tutorial_by_exact_key() {
        let table = fixtures::schedule_1();
        let row = table
            .resolve(
                TaskType::Tutorial,
                Qualification::Standard,
                false,
                date(2024, 7, 8),
            )
            .unwrap();
        assert_eq!(row.rate_code, "TU2");
        assert_eq!(row.hourly_rate, dec!(58.6467));
        assert_eq!(row.associated_hours_cap, Some(dec!(2.0)));
    }

    #[test]
    fn repeat_flag_selects_the_repeat_row() {
        let table = fixtures::schedule_1();
        let row = table
            .resolve(
                TaskType::Tutorial,
                Qualification::Phd,
                true,
                date(2024, 7, 8),
            )
            .unwrap();
        assert_eq!(row.rate_code, "TU3");
        assert_eq!(row.associated_hours_cap, Some(dec!(1.0)));
    }

    #[test]
    fn wildcard_repeat_rows_match_either_flag() {
        let table = fixtures::schedule_1();
        for repeat in [false, true] {
            let row = table
                .resolve(
                    TaskType::Marking,
                    Qualification::Standard,
                    repeat,
                    date(2025, 2, 10),
                )
                .unwrap();
            assert_eq!(row.rate_code, "MK1");
        }
    }

    #[test]
    fn dates_before_the_window_miss() {
        let table = fixtures::schedule_1();
        let err = table
            .resolve(
                TaskType::Lecture,
                Qualification::Standard,
                false,
                date(2024, 6, 30),
            )
            .unwrap_err();
        assert_eq!(err.task_type, TaskType::Lecture);
        assert_eq!(err.date, date(2024, 6, 30));
    }

    #[test]
    fn no_rows_exist_for_other() {
        let table = fixtures::schedule_1();
        assert!(table
            .resolve(
                TaskType::Other,
                Qualification::Standard,
                false,
                date(2024, 7, 8),
            )
            .is_err());
    }

    #[test]
    fn effective_to_is_exclusive() {
        let mut old_row = fixtures::schedule_1()
            .resolve(
                TaskType::Lecture,
                Qualification::Standard,
                false,
                date(2024, 7, 8),
            )
            .unwrap()
            .clone();
        old_row.effective_from = date(2023, 7, 1);
        old_row.effective_to = Some(date(2024, 7, 1));
        old_row.hourly_rate = dec!(158.11);
        let mut new_row = old_row.clone();
        new_row.effective_from = date(2024, 7, 1);
        new_row.effective_to = None;
        new_row.hourly_rate = dec!(163.87);

        let table = PolicyTable::new(vec![old_row, new_row]).unwrap();
        let boundary = table
            .resolve(
                TaskType::Lecture,
                Qualification::Standard,
                false,
                date(2024, 7, 1),
            )
            .unwrap();
        assert_eq!(boundary.hourly_rate, dec!(163.87));
        let before = table
            .resolve(
                TaskType::Lecture,
                Qualification::Standard,
                false,
                date(2024, 6, 30),
            )
            .unwrap();
        assert_eq!(before.hourly_rate, dec!(158.11));
    }

    #[test]
    fn overlapping_windows_are_refused_at_load() {
        let base = fixtures::schedule_1()
            .resolve(
                TaskType::Lecture,
                Qualification::Standard,
                false,
                date(2024, 7, 8),
            )
            .unwrap()
            .clone();
        let mut shifted = base.clone();
        shifted.effective_from = date(2025, 1, 1);

        assert!(PolicyTable::new(vec![base, shifted]).is_err());
    }

    #[test]
    fn wildcard_and_pinned_repeat_rows_overlap() {
        let table = fixtures::schedule_1();
        let pinned = table
            .resolve(
                TaskType::Tutorial,
                Qualification::Standard,
                false,
                date(2024, 7, 8),
            )
            .unwrap()
            .clone();
        let mut wildcard = pinned.clone();
        wildcard.repeat_session = None;

        assert!(PolicyTable::new(vec![pinned, wildcard]).is_err());
    }

    #[test]
    fn store_swaps_snapshots_atomically() {
        let store = PolicyStore::new(fixtures::schedule_1());
        let before = store.snapshot();
        store.replace(PolicyTable::new(Vec::new()).unwrap());
        let after = store.snapshot();

        assert_eq!(before.len(), fixtures::schedule_1().len());
        assert!(after.is_empty());
    }
}
