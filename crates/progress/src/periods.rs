//! Calendar period math shared by timeframe windows and streak detection.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

use trimtrack_core::catalog::Timeframe;

/// Start of the current instance of the period containing `now`.
/// `AllTime` has no window, so no filter applies.
pub fn window_start(timeframe: Timeframe, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let date = now.date_naive();
    let start = match timeframe {
        Timeframe::Daily => date,
        Timeframe::Weekly => date - Duration::days(date.weekday().num_days_from_monday() as i64),
        Timeframe::Monthly => date.with_day(1).unwrap_or(date),
        Timeframe::Yearly => date.with_ordinal(1).unwrap_or(date),
        Timeframe::AllTime => return None,
    };
    Some(start.and_time(NaiveTime::MIN).and_utc())
}

/// Maps a timestamp to a monotonically increasing period index so that
/// consecutive periods differ by exactly one. Weeks are Monday-aligned.
/// `AllTime` falls back to monthly granularity, the platform's default
/// streak period.
pub fn period_index(timeframe: Timeframe, at: DateTime<Utc>) -> i64 {
    let date = at.date_naive();
    match timeframe {
        Timeframe::Daily => date.num_days_from_ce() as i64,
        Timeframe::Weekly => {
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            monday.num_days_from_ce() as i64 / 7
        }
        Timeframe::Monthly | Timeframe::AllTime => {
            date.year() as i64 * 12 + date.month0() as i64
        }
        Timeframe::Yearly => date.year() as i64,
    }
}
