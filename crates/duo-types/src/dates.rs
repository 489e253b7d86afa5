/// Calendar math for the countdown and the once-per-day gates.
///
/// "Today" is always the *local* calendar day of the machine the client runs
/// on — daily unlocks are keyed on what the user perceives as today, not on
/// a UTC rollover.

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Weekday};

pub const MS_PER_DAY: i64 = 86_400_000;

/// Caps for the "next milestone" display, descending.
pub const MILESTONE_CAPS: [i64; 12] = [60, 45, 30, 21, 14, 10, 7, 5, 3, 2, 1, 0];

/// `YYYY-MM-DD` key for a calendar day.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Today's key in the local timezone.
pub fn today_key() -> String {
    day_key(Local::now().date_naive())
}

pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

/// Parse a stored `targetISO` timestamp into unix milliseconds.
/// Empty or malformed values mean "no target set".
pub fn parse_target_iso(target_iso: &str) -> Option<i64> {
    if target_iso.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(target_iso)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Build the `targetISO` value for a `YYYY-MM-DD` picked in the date input:
/// local noon of that day, serialized as RFC 3339 in UTC. Noon keeps the
/// day-difference math stable across timezones and DST shifts.
pub fn target_iso_for_day(day: &str) -> Option<String> {
    let date = parse_day_key(day)?;
    let noon = date.and_hms_opt(12, 0, 0)?;
    let local = Local.from_local_datetime(&noon).single()?;
    Some(local.with_timezone(&chrono::Utc).to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeParts {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// Clamp a millisecond duration to zero and decompose it by integer
/// division. No rounding: 23h59m59s999ms is still 0 days.
pub fn ms_to_parts(ms: i64) -> TimeParts {
    let s = ms.max(0) / 1000;
    let days = s / 86_400;
    let rem = s % 86_400;
    TimeParts {
        days,
        hours: rem / 3600,
        minutes: (rem % 3600) / 60,
        seconds: rem % 60,
    }
}

/// Whole days until the target, rounded up — the countdown says "5 days"
/// from the moment there are more than 4 full days left. Matches the float
/// `ceil` the original client and dispatcher both used.
pub fn days_until(target_ms: i64, now_ms: i64) -> i64 {
    ((target_ms - now_ms) as f64 / MS_PER_DAY as f64).ceil() as i64
}

/// Milliseconds until the next local midnight (when the daily content
/// re-locks).
pub fn ms_until_midnight(now: DateTime<Local>) -> i64 {
    let next = now
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|dt| Local.from_local_datetime(&dt).earliest());
    match next {
        Some(midnight) => midnight.timestamp_millis() - now.timestamp_millis(),
        // Unreachable outside the chrono calendar bounds.
        None => 0,
    }
}

/// Largest cap strictly below `days`, or None once the reunion has passed.
pub fn next_milestone(days: i64) -> Option<i64> {
    MILESTONE_CAPS.iter().copied().find(|&cap| days > cap)
}

/// Count Saturdays in `[from, to)`, stepping whole calendar days. NaiveDate
/// arithmetic has no DST boundaries to skip over.
pub fn weekends_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to <= from {
        return 0;
    }
    let mut count = 0;
    let mut d = from;
    while d < to {
        if d.weekday() == Weekday::Sat {
            count += 1;
        }
        match d.succ_opt() {
            Some(next) => d = next,
            None => break,
        }
    }
    count
}

/// Nights to sleep before the reunion — the countdown's "dodos".
pub fn nights_left(days: i64) -> i64 {
    days.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_ms_to_parts() {
        let parts = ms_to_parts(5 * MS_PER_DAY + 3 * 3_600_000 + 7 * 60_000 + 9_000 + 999);
        assert_eq!(parts, TimeParts { days: 5, hours: 3, minutes: 7, seconds: 9 });
    }

    #[test]
    fn test_ms_to_parts_clamps_negative() {
        assert_eq!(ms_to_parts(-42), TimeParts { days: 0, hours: 0, minutes: 0, seconds: 0 });
    }

    #[test]
    fn test_days_until_rounds_up() {
        assert_eq!(days_until(MS_PER_DAY, 0), 1);
        assert_eq!(days_until(MS_PER_DAY + 1, 0), 2);
        assert_eq!(days_until(0, 0), 0);
        // Past targets round toward zero, like the original's Math.ceil.
        assert_eq!(days_until(0, MS_PER_DAY / 2), 0);
        assert_eq!(days_until(0, 3 * MS_PER_DAY), -3);
    }

    #[test]
    fn test_next_milestone() {
        assert_eq!(next_milestone(90), Some(60));
        assert_eq!(next_milestone(60), Some(45));
        assert_eq!(next_milestone(15), Some(14));
        assert_eq!(next_milestone(14), Some(10));
        assert_eq!(next_milestone(1), Some(0));
        assert_eq!(next_milestone(0), None);
        assert_eq!(next_milestone(-2), None);
    }

    #[test]
    fn test_weekends_between_monday_to_monday() {
        // 2026-03-02 is a Monday; one Saturday (2026-03-07) in the week.
        assert_eq!(weekends_between(d("2026-03-02"), d("2026-03-09")), 1);
    }

    #[test]
    fn test_weekends_between_excludes_end() {
        // Friday to Saturday: the Saturday is the (excluded) end date.
        assert_eq!(weekends_between(d("2026-03-06"), d("2026-03-07")), 0);
        // Saturday to Sunday: the Saturday is counted.
        assert_eq!(weekends_between(d("2026-03-07"), d("2026-03-08")), 1);
    }

    #[test]
    fn test_weekends_between_empty_or_reversed() {
        assert_eq!(weekends_between(d("2026-03-09"), d("2026-03-09")), 0);
        assert_eq!(weekends_between(d("2026-03-09"), d("2026-03-02")), 0);
    }

    #[test]
    fn test_parse_target_iso() {
        assert_eq!(parse_target_iso(""), None);
        assert_eq!(parse_target_iso("not-a-date"), None);
        let ms = parse_target_iso("2026-06-01T12:00:00.000Z").unwrap();
        assert_eq!(ms, 1_780_315_200_000);
    }

    #[test]
    fn test_target_iso_roundtrip() {
        let iso = target_iso_for_day("2026-06-01").unwrap();
        let ms = parse_target_iso(&iso).unwrap();
        // Local noon, whatever the zone, lands inside the picked day ±1.
        let day = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms).unwrap().date_naive();
        assert!((day - d("2026-06-01")).num_days().abs() <= 1);
    }

    #[test]
    fn test_day_key_format() {
        assert_eq!(day_key(d("2026-02-05")), "2026-02-05");
        assert_eq!(parse_day_key("2026-02-05"), Some(d("2026-02-05")));
        assert_eq!(parse_day_key("05/02/2026"), None);
    }
}
