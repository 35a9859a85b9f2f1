//! Study-time statistics derived from learning logs.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use coach_core::model::LearningLog;

/// Start (Monday 00:00 UTC) and end (next Monday) of the ISO week containing `today`.
#[must_use]
pub fn week_bounds(today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let start = monday.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(7))
}

/// Hours logged during the week containing `today`, rounded to 0.1.
#[must_use]
pub fn weekly_hours(logs: &[LearningLog], today: NaiveDate) -> f64 {
    let (start, end) = week_bounds(today);
    let minutes: f64 = logs
        .iter()
        .filter(|l| l.logged_at >= start && l.logged_at < end)
        .map(|l| l.duration_minutes)
        .sum();
    (minutes / 60.0 * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Streaks {
    pub current: u32,
    pub longest: u32,
}

/// Consecutive study days.
///
/// The current streak counts back from today, or from yesterday when nothing
/// has been logged yet today.
#[must_use]
pub fn streaks(logs: &[LearningLog], today: NaiveDate) -> Streaks {
    let days: BTreeSet<NaiveDate> = logs
        .iter()
        .map(|l| l.logged_at.date_naive())
        .filter(|d| *d <= today)
        .collect();

    let mut longest = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for day in &days {
        run = match prev {
            Some(p) if *day - p == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(*day);
    }

    let mut cursor = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };
    let mut current = 0;
    while days.contains(&cursor) {
        current += 1;
        cursor -= Duration::days(1);
    }

    Streaks { current, longest }
}
