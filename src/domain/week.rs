use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};

/// Monday of the week containing `date`. All timesheets are week-granular
/// and anchored to this date.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    let days_from_monday = date.weekday().num_days_from_monday() as i64;
    date - Duration::days(days_from_monday)
}

/// Monday of the current (UTC) week, the latest week a timesheet may claim.
pub fn current_monday() -> NaiveDate {
    monday_of(Utc::now().date_naive())
}

pub fn is_monday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Mon
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monday_of_maps_every_weekday_back() {
        let monday = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();
        for offset in 0..7 {
            let day = monday + Duration::days(offset);
            assert_eq!(monday_of(day), monday);
        }
    }

    #[test]
    fn monday_of_is_identity_on_mondays() {
        let monday = NaiveDate::from_ymd_opt(2024, 7, 8).unwrap();
        assert!(is_monday(monday));
        assert_eq!(monday_of(monday), monday);
    }

    #[test]
    fn sunday_belongs_to_the_preceding_monday() {
        let sunday = NaiveDate::from_ymd_opt(2025, 2, 16).unwrap();
        assert_eq!(
            monday_of(sunday),
            NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()
        );
    }
}
