//! Quiet-hours evaluation.
//!
//! Pure functions over a preference snapshot; the dispatcher never re-fetches
//! preferences mid-dispatch, so an in-flight fan-out always sees one
//! consistent window.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::QuietHours;

/// Parse a "HH:MM" clock time.
pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

fn timezone_of(quiet_hours: &QuietHours) -> Tz {
    quiet_hours.timezone.parse().unwrap_or(chrono_tz::UTC)
}

/// Whether `now` falls inside the user's quiet-hours window `[start, end)`,
/// evaluated in the configured timezone. A window whose end precedes its
/// start crosses midnight and is treated as `now >= start || now < end`.
pub fn is_in_quiet_hours(quiet_hours: &QuietHours, now: DateTime<Utc>) -> bool {
    if !quiet_hours.enabled {
        return false;
    }

    let (Some(start), Some(end)) = (
        parse_hhmm(&quiet_hours.start),
        parse_hhmm(&quiet_hours.end),
    ) else {
        return false;
    };

    if start == end {
        // Empty window
        return false;
    }

    let local = now.with_timezone(&timezone_of(quiet_hours)).time();

    if start < end {
        local >= start && local < end
    } else {
        local >= start || local < end
    }
}

/// The next occurrence of the window's end in the user's timezone, as UTC.
///
/// On a daylight-saving gap day the nominal end time may not exist locally;
/// the instant one hour later is used, the same shift the clock itself makes.
pub fn next_quiet_hours_end(quiet_hours: &QuietHours, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(end) = parse_hhmm(&quiet_hours.end) else {
        return now;
    };

    let tz = timezone_of(quiet_hours);
    let local_now = now.with_timezone(&tz);

    let mut date = local_now.date_naive();
    if local_now.time() >= end {
        date += Duration::days(1);
    }

    resolve_local(tz, date.and_time(end)).with_timezone(&Utc)
}

fn resolve_local(tz: Tz, naive: chrono::NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt,
        // Fall-back transition: two valid instants, take the earlier one
        chrono::LocalResult::Ambiguous(earlier, _) => earlier,
        // Spring-forward gap: the wall time does not exist
        chrono::LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => dt,
            chrono::LocalResult::None => tz.from_utc_datetime(&naive),
        },
    }
}
