//! Calendar helpers built on `chrono::NaiveDate`.

use chrono::{Datelike, Duration, NaiveDate};

pub const DAYS_IN_YEAR: i32 = 365;

/// 1-based day of year (1..=366).
#[must_use]
pub fn day_of_year(date: NaiveDate) -> i32 {
    date.ordinal() as i32
}

#[must_use]
pub fn is_first_day_of_month(date: NaiveDate) -> bool {
    date.day() == 1
}

#[must_use]
pub fn is_first_day_of_year(date: NaiveDate) -> bool {
    date.month() == 1 && date.day() == 1
}

/// Days until the same calendar date next year (365 or 366). A February 29
/// anniversary falls back to March 1.
#[must_use]
pub fn days_to_next_year(date: NaiveDate) -> i32 {
    let next = NaiveDate::from_ymd_opt(date.year() + 1, date.month(), date.day())
        .unwrap_or_else(|| {
            NaiveDate::from_ymd_opt(date.year() + 1, 3, 1).expect("March 1 always exists")
        });
    (next - date).num_days() as i32
}

#[must_use]
pub fn add_days(date: NaiveDate, days: i32) -> NaiveDate {
    date + Duration::days(i64::from(days))
}

#[must_use]
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to - from).num_days() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_of_year() {
        assert_eq!(day_of_year(date(2021, 1, 1)), 1);
        assert_eq!(day_of_year(date(2021, 12, 31)), 365);
        assert_eq!(day_of_year(date(2020, 12, 31)), 366);
    }

    #[test]
    fn test_days_to_next_year() {
        assert_eq!(days_to_next_year(date(2021, 3, 15)), 365);
        // Crosses Feb 29 of a leap year
        assert_eq!(days_to_next_year(date(2023, 3, 15)), 366);
        // Feb 29 anniversary falls back to Mar 1
        assert_eq!(days_to_next_year(date(2020, 2, 29)), 366);
    }

    #[test]
    fn test_days_between() {
        assert_eq!(days_between(date(2021, 1, 1), date(2021, 2, 1)), 31);
        assert_eq!(days_between(date(2021, 2, 1), date(2021, 1, 1)), -31);
    }
}
