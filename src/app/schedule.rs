//! iRacing week and season arithmetic
//!
//! iRacing race weeks start on Tuesday and run in 12-week seasons. Week
//! numbers are derived from a fixed season anchor date; season numbers
//! from approximate per-year season start dates. Both dates come from
//! [`crate::constants::schedule`] and need updating when iRacing shifts
//! the calendar.
//!
//! All functions take the date as a parameter so tests are deterministic.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::constants::schedule::{SEASON_ANCHOR, SEASON_STARTS, WEEKS_PER_SEASON};

/// Current race week (1-12) for the given date
///
/// Finds the most recent Tuesday on or before `today`, then counts whole
/// weeks from the season anchor, wrapping every twelve weeks.
pub fn current_week(today: NaiveDate) -> u32 {
    let most_recent_tuesday = to_tuesday(today);

    let (year, month, day) = SEASON_ANCHOR;
    // Anchor is a build-time constant, known valid
    let anchor = NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(2025, 9, 10).unwrap());
    // Normalize so the anchor's own week counts as week 1 even when the
    // published start date is not a Tuesday
    let anchor_tuesday = to_tuesday(anchor);

    let weeks_since = (most_recent_tuesday - anchor_tuesday).num_days().div_euclid(7);
    weeks_since.rem_euclid(WEEKS_PER_SEASON as i64) as u32 + 1
}

/// Most recent Tuesday on or before the given date
fn to_tuesday(date: NaiveDate) -> NaiveDate {
    let days_since_tuesday = date.weekday().days_since(Weekday::Tue);
    date - Duration::days(days_since_tuesday as i64)
}

/// Current season number (1-4) for the given date
///
/// Picks the latest per-year season start that is not after `today`.
/// Before the first start of the year this is the previous year's final
/// season, so the answer is 4.
pub fn current_season(today: NaiveDate) -> u32 {
    let year = today.year();
    let mut season = 4;
    for (index, &(month, day)) in SEASON_STARTS.iter().enumerate().rev() {
        if let Some(start) = NaiveDate::from_ymd_opt(year, month, day) {
            if today >= start {
                season = index as u32 + 1;
                break;
            }
        }
    }
    season
}

/// The week after `week`, wrapping 12 back to 1
pub fn next_week(week: u32) -> u32 {
    if week >= WEEKS_PER_SEASON {
        1
    } else {
        week + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_one_on_anchor_tuesday() {
        // 2025-09-10 is a Wednesday; the anchor Tuesday maths still
        // place that whole week in week 1
        assert_eq!(current_week(date(2025, 9, 10)), 1);
        assert_eq!(current_week(date(2025, 9, 15)), 1);
    }

    #[test]
    fn test_week_advances_each_tuesday() {
        // First Tuesday after the anchor week
        assert_eq!(current_week(date(2025, 9, 16)), 2);
        assert_eq!(current_week(date(2025, 9, 22)), 2);
        assert_eq!(current_week(date(2025, 9, 23)), 3);
    }

    #[test]
    fn test_week_wraps_after_twelve() {
        // Eleven full weeks after the anchor Tuesday is week 12
        assert_eq!(current_week(date(2025, 11, 25)), 12);
        // Twelve full weeks wraps to week 1
        assert_eq!(current_week(date(2025, 12, 2)), 1);
    }

    #[test]
    fn test_week_stays_in_range_before_anchor() {
        let week = current_week(date(2025, 8, 1));
        assert!((1..=12).contains(&week));
    }

    #[test]
    fn test_season_boundaries() {
        assert_eq!(current_season(date(2026, 1, 6)), 4);
        assert_eq!(current_season(date(2026, 1, 7)), 1);
        assert_eq!(current_season(date(2026, 3, 31)), 1);
        assert_eq!(current_season(date(2026, 4, 1)), 2);
        assert_eq!(current_season(date(2026, 6, 30)), 2);
        assert_eq!(current_season(date(2026, 7, 1)), 3);
        assert_eq!(current_season(date(2026, 9, 9)), 3);
        assert_eq!(current_season(date(2026, 9, 10)), 4);
        assert_eq!(current_season(date(2026, 12, 31)), 4);
    }

    #[test]
    fn test_next_week_wraps() {
        assert_eq!(next_week(1), 2);
        assert_eq!(next_week(11), 12);
        assert_eq!(next_week(12), 1);
    }
}
