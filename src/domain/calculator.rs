//! Schedule 1 pay calculation.
//!
//! Pure and deterministic: given a policy snapshot and the proposed session
//! inputs it produces the full pay outcome (rate code, associated hours,
//! payable hours, amount, formula, clause) without touching persistence.
//! Monetary rounding happens once, half-up to two places, at the amount
//! step; intermediate products keep full precision.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::{Qualification, TaskType};
use crate::domain::policy::{PolicyNotFound, PolicyRow, PolicyTable};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteInput {
    pub task_type: TaskType,
    pub qualification: Qualification,
    pub repeat_session: bool,
    pub delivery_hours: Decimal,
    pub session_date: NaiveDate,
    /// Marking performed during the tutorial itself. Folds into tutorial
    /// associated hours rather than being separately payable.
    pub contemporaneous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub rate_code: String,
    pub hourly_rate: Decimal,
    pub delivery_hours: Decimal,
    pub associated_hours: Decimal,
    pub payable_hours: Decimal,
    pub amount: Decimal,
    pub formula: String,
    pub clause_reference: String,
    pub session_date: NaiveDate,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalculationError {
    #[error(transparent)]
    PolicyNotFound(#[from] PolicyNotFound),
    #[error("tutorial delivery is fixed at 1.0 hour")]
    InvalidTutorialDelivery,
    #[error("task type OTHER is not payable under Schedule 1")]
    UnsupportedTaskType,
    #[error("contemporaneous marking is covered by tutorial associated hours")]
    ContemporaneousMarkingNotPayable,
    #[error("delivery hours must be positive")]
    NonPositiveHours,
}

pub fn calculate(table: &PolicyTable, input: QuoteInput) -> Result<Quote, CalculationError> {
    if input.task_type == TaskType::Other {
        return Err(CalculationError::UnsupportedTaskType);
    }
    if input.task_type == TaskType::Marking && input.contemporaneous {
        return Err(CalculationError::ContemporaneousMarkingNotPayable);
    }
    if input.delivery_hours <= Decimal::ZERO {
        return Err(CalculationError::NonPositiveHours);
    }
    if input.task_type == TaskType::Tutorial && input.delivery_hours != dec!(1.0) {
        return Err(CalculationError::InvalidTutorialDelivery);
    }

    let row = table.resolve(
        input.task_type,
        input.qualification,
        input.repeat_session,
        input.session_date,
    )?;

    let delivery_hours = input.delivery_hours.round_dp(2);
    let associated_hours = if input.task_type == TaskType::Tutorial {
        row.associated_hours_cap.unwrap_or_default().round_dp(2)
    } else {
        Decimal::ZERO
    };
    let payable_hours = delivery_hours + associated_hours;
    let amount = (payable_hours * row.hourly_rate)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Ok(Quote {
        rate_code: row.rate_code.clone(),
        hourly_rate: row.hourly_rate,
        delivery_hours,
        associated_hours,
        payable_hours,
        amount,
        formula: render_formula(row, delivery_hours, associated_hours),
        clause_reference: row.clause_reference.clone(),
        session_date: input.session_date,
    })
}

fn render_formula(row: &PolicyRow, delivery: Decimal, associated: Decimal) -> String {
    row.formula_template
        .replace("{delivery}", &delivery.normalize().to_string())
        .replace("{associated}", &associated.normalize().to_string())
        .replace("{rate}", &format!("${}/hr", row.hourly_rate.normalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::fixtures::schedule_1;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(
        task_type: TaskType,
        qualification: Qualification,
        repeat: bool,
        delivery: Decimal,
    ) -> QuoteInput {
        QuoteInput {
            task_type,
            qualification,
            repeat_session: repeat,
            delivery_hours: delivery,
            session_date: date(2024, 7, 8),
            contemporaneous: false,
        }
    }

    #[test]
    fn standard_tutorial_quotes_tu2_with_two_associated_hours() {
        let table = schedule_1();
        let quote = calculate(
            &table,
            input(TaskType::Tutorial, Qualification::Standard, false, dec!(1.0)),
        )
        .unwrap();

        assert_eq!(quote.rate_code, "TU2");
        assert_eq!(quote.associated_hours, dec!(2.00));
        assert_eq!(quote.payable_hours, dec!(3.00));
        assert_eq!(quote.amount, dec!(175.94));
        assert!(quote.formula.contains("1h"));
        assert!(quote.formula.contains("2h associated"));
        assert_eq!(quote.clause_reference, "Schedule 1, Item 1(b)");
    }

    #[test]
    fn repeat_phd_tutorial_quotes_tu3_with_one_associated_hour() {
        let table = schedule_1();
        let quote = calculate(
            &table,
            input(TaskType::Tutorial, Qualification::Phd, true, dec!(1.0)),
        )
        .unwrap();

        assert_eq!(quote.rate_code, "TU3");
        assert_eq!(quote.associated_hours, dec!(1.00));
        assert_eq!(quote.payable_hours, dec!(2.00));
        assert_eq!(quote.amount, dec!(139.27));
    }

    #[test]
    fn lecture_pays_delivery_hours_only() {
        let table = schedule_1();
        let quote = calculate(
            &table,
            input(TaskType::Lecture, Qualification::Phd, false, dec!(2.0)),
        )
        .unwrap();

        assert_eq!(quote.rate_code, "LE1");
        assert_eq!(quote.associated_hours, Decimal::ZERO);
        assert_eq!(quote.payable_hours, dec!(2.00));
        assert_eq!(quote.amount, dec!(327.74));
        assert!(quote.formula.contains("2h @"));
    }

    #[test]
    fn oraa_band_split_maps_phd_to_ao1_and_standard_to_ao2() {
        let table = schedule_1();
        let high = calculate(
            &table,
            input(TaskType::Oraa, Qualification::Phd, false, dec!(3.0)),
        )
        .unwrap();
        let standard = calculate(
            &table,
            input(TaskType::Oraa, Qualification::Standard, false, dec!(3.0)),
        )
        .unwrap();

        assert_eq!(high.rate_code, "AO1");
        assert_eq!(high.amount, dec!(162.51));
        assert_eq!(standard.rate_code, "AO2");
        assert_eq!(standard.amount, dec!(136.35));
    }

    #[test]
    fn demo_band_split_mirrors_oraa() {
        let table = schedule_1();
        let coordinator = calculate(
            &table,
            input(TaskType::Demo, Qualification::Coordinator, false, dec!(1.5)),
        )
        .unwrap();
        assert_eq!(coordinator.rate_code, "DE1");

        let standard = calculate(
            &table,
            input(TaskType::Demo, Qualification::Standard, false, dec!(1.5)),
        )
        .unwrap();
        assert_eq!(standard.rate_code, "DE2");
    }

    #[test]
    fn marking_is_hourly_at_mk1() {
        let table = schedule_1();
        let quote = calculate(
            &table,
            input(TaskType::Marking, Qualification::Standard, false, dec!(10.0)),
        )
        .unwrap();

        assert_eq!(quote.rate_code, "MK1");
        assert_eq!(quote.amount, dec!(450.00));
    }

    #[test]
    fn contemporaneous_marking_is_refused() {
        let table = schedule_1();
        let mut marking = input(TaskType::Marking, Qualification::Standard, false, dec!(2.0));
        marking.contemporaneous = true;

        assert_eq!(
            calculate(&table, marking),
            Err(CalculationError::ContemporaneousMarkingNotPayable)
        );
    }

    #[test]
    fn other_task_type_is_unsupported() {
        let table = schedule_1();
        assert_eq!(
            calculate(
                &table,
                input(TaskType::Other, Qualification::Standard, false, dec!(1.0)),
            ),
            Err(CalculationError::UnsupportedTaskType)
        );
    }

    #[test]
    fn zero_and_negative_delivery_hours_are_refused() {
        let table = schedule_1();
        for hours in [Decimal::ZERO, dec!(-1.0)] {
            assert_eq!(
                calculate(
                    &table,
                    input(TaskType::Marking, Qualification::Standard, false, hours),
                ),
                Err(CalculationError::NonPositiveHours)
            );
        }
    }

    #[test]
    fn tutorial_delivery_other_than_one_hour_is_refused() {
        let table = schedule_1();
        for hours in [dec!(0.5), dec!(2.0)] {
            assert_eq!(
                calculate(
                    &table,
                    input(TaskType::Tutorial, Qualification::Standard, false, hours),
                ),
                Err(CalculationError::InvalidTutorialDelivery)
            );
        }
    }

    #[test]
    fn policy_miss_surfaces_the_lookup_error() {
        let table = schedule_1();
        let mut early = input(TaskType::Lecture, Qualification::Standard, false, dec!(1.0));
        early.session_date = date(2024, 6, 30);

        assert!(matches!(
            calculate(&table, early),
            Err(CalculationError::PolicyNotFound(_))
        ));
    }

    #[test]
    fn amount_rounds_half_up_at_the_final_step() {
        // 0.5h x 45.45 = 22.725, which banker's rounding would take to 22.72.
        let table = schedule_1();
        let quote = calculate(
            &table,
            input(TaskType::Oraa, Qualification::Standard, false, dec!(0.5)),
        )
        .unwrap();

        assert_eq!(quote.amount, dec!(22.73));
    }

    #[test]
    fn quotes_are_deterministic_for_fixed_inputs() {
        let table = schedule_1();
        let probe = input(TaskType::Tutorial, Qualification::Standard, false, dec!(1.0));
        let first = calculate(&table, probe).unwrap();
        let second = calculate(&table, probe).unwrap();

        assert_eq!(first, second);
    }
}
