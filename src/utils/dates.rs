//! Calendar helpers shared by leave accounting and payroll periods.
//!
//! Financial years follow the April-to-March convention and are written as
//! `"2025-2026"`.

use chrono::{Datelike, NaiveDate, Weekday};

/// True for Saturday and Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Public holiday lookup. No holiday calendar is configured, so no date is a
/// holiday; working-day counts therefore only skip weekends.
pub fn is_holiday(_date: NaiveDate) -> bool {
    false
}

/// Counts the days in `start..=end` that are neither weekends nor holidays.
/// An inverted range counts as zero days.
pub fn calculate_working_days(start: NaiveDate, end: NaiveDate) -> u32 {
    if start > end {
        return 0;
    }
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !is_weekend(*d) && !is_holiday(*d))
        .count() as u32
}

/// `"Y-(Y+1)"` from April onwards, `"(Y-1)-Y"` for January to March.
pub fn get_financial_year(date: NaiveDate) -> String {
    let start = financial_year_start_year(date);
    format!("{}-{}", start, start + 1)
}

fn financial_year_start_year(date: NaiveDate) -> i32 {
    if date.month() >= 4 {
        date.year()
    } else {
        date.year() - 1
    }
}

/// First and last day of the financial year containing `date`.
pub fn financial_year_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start_year = financial_year_start_year(date);
    // April 1st and March 31st exist in every year.
    let start = NaiveDate::from_ymd_opt(start_year, 4, 1).unwrap_or(date);
    let end = NaiveDate::from_ymd_opt(start_year + 1, 3, 31).unwrap_or(date);
    (start, end)
}

/// First day of the month containing `date`; payroll periods are keyed by it.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First and last day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = month_start(date);
    let next = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    let end = next.and_then(|n| n.pred_opt()).unwrap_or(start);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekend_detection() {
        // 2026-01-17 is a Saturday
        assert!(is_weekend(d(2026, 1, 17)));
        assert!(is_weekend(d(2026, 1, 18)));
        assert!(!is_weekend(d(2026, 1, 19)));
        assert!(!is_weekend(d(2026, 1, 16)));
    }

    #[test]
    fn single_day_ranges() {
        assert_eq!(calculate_working_days(d(2026, 1, 19), d(2026, 1, 19)), 1);
        assert_eq!(calculate_working_days(d(2026, 1, 17), d(2026, 1, 17)), 0);
    }

    #[test]
    fn full_week_has_five_working_days() {
        assert_eq!(calculate_working_days(d(2026, 1, 12), d(2026, 1, 18)), 5);
        // Friday to Monday spans a weekend
        assert_eq!(calculate_working_days(d(2026, 1, 16), d(2026, 1, 19)), 2);
    }

    #[test]
    fn inverted_range_is_zero() {
        assert_eq!(calculate_working_days(d(2026, 1, 20), d(2026, 1, 19)), 0);
    }

    #[test]
    fn holidays_are_not_configured() {
        assert!(!is_holiday(d(2026, 1, 26)));
        assert!(!is_holiday(d(2026, 12, 25)));
    }

    #[test]
    fn financial_year_boundaries() {
        assert_eq!(get_financial_year(d(2026, 3, 31)), "2025-2026");
        assert_eq!(get_financial_year(d(2026, 4, 1)), "2026-2027");
        assert_eq!(get_financial_year(d(2026, 1, 1)), "2025-2026");
        assert_eq!(get_financial_year(d(2025, 12, 31)), "2025-2026");
    }

    #[test]
    fn financial_year_bounds_cover_april_to_march() {
        assert_eq!(
            financial_year_bounds(d(2026, 2, 14)),
            (d(2025, 4, 1), d(2026, 3, 31))
        );
        assert_eq!(
            financial_year_bounds(d(2026, 4, 1)),
            (d(2026, 4, 1), d(2027, 3, 31))
        );
    }

    #[test]
    fn month_bounds_handle_year_end_and_leap_years() {
        assert_eq!(month_bounds(d(2026, 12, 9)), (d(2026, 12, 1), d(2026, 12, 31)));
        assert_eq!(month_bounds(d(2028, 2, 10)), (d(2028, 2, 1), d(2028, 2, 29)));
        assert_eq!(month_start(d(2026, 6, 30)), d(2026, 6, 1));
    }

    #[test]
    fn weekend_matches_weekday_over_several_years() {
        let mut day = d(2020, 1, 1);
        while day <= d(2030, 12, 31) {
            let expected = matches!(day.weekday(), Weekday::Sat | Weekday::Sun);
            assert_eq!(is_weekend(day), expected, "{day}");
            day = day.succ_opt().unwrap();
        }
    }

    proptest! {
        #[test]
        fn working_days_never_exceed_calendar_days(offset in 0i64..20_000, len in 0i64..400) {
            let start = d(1990, 1, 1) + chrono::Duration::days(offset);
            let end = start + chrono::Duration::days(len);
            let working = calculate_working_days(start, end) as i64;
            prop_assert!(working <= len + 1);
            // every full week contributes exactly five
            prop_assert!(working >= ((len + 1) / 7) * 5);
        }

        #[test]
        fn financial_year_contains_date(offset in 0i64..20_000) {
            let date = d(1990, 1, 1) + chrono::Duration::days(offset);
            let (start, end) = financial_year_bounds(date);
            prop_assert!(start <= date && date <= end);
            prop_assert_eq!(
                get_financial_year(date),
                format!("{}-{}", start.year(), end.year())
            );
        }
    }
}
