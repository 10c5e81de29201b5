//! Reminder-window math and run-to-run dedup for appointment reminders.
//!
//! This module lives in `core` (zero internal deps, no I/O) so the
//! scheduler loop in `fieldline-events` stays thin and the eligibility /
//! dedup rules can be unit-tested without timers or a database.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::types::DbId;

/// Lead window in minutes before an appointment during which a reminder is
/// eligible to fire. Slightly over an hour to tolerate the 5-minute poll
/// granularity without missing or double-firing near the boundary.
pub const REMINDER_WINDOW_MINS: i64 = 65;

/// Default upper bound on the dedup set before it is cleared.
pub const DEFAULT_DEDUP_MAX: usize = 1000;

/// Fallback timezone for organizations that have none configured.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Australia::Brisbane;

/// Resolve an organization's configured timezone string.
///
/// Unset or unparseable values fall back to [`DEFAULT_TIMEZONE`].
pub fn resolve_timezone(tz: Option<&str>) -> Tz {
    tz.and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_TIMEZONE)
}

/// The two calendar dates the scheduler queries per run: "today" and
/// "tomorrow" in the given timezone. A 2-day lookahead bounds the query
/// without requiring per-tenant timezone knowledge up front.
pub fn lookahead_dates(now: DateTime<Utc>, tz: Tz) -> [NaiveDate; 2] {
    let today = now.with_timezone(&tz).date_naive();
    [today, today.succ_opt().unwrap_or(today)]
}

/// Absolute instant of an appointment from its calendar date, start time,
/// and the owning tenant's timezone.
///
/// Returns `None` for local datetimes that do not exist in the timezone
/// (DST spring-forward gaps).
pub fn appointment_instant(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whole minutes from `now` until `instant`; negative once the instant has
/// passed.
pub fn minutes_until(now: DateTime<Utc>, instant: DateTime<Utc>) -> i64 {
    (instant - now).num_minutes()
}

/// Whether an appointment this many minutes away is inside the lead window.
pub fn in_reminder_window(minutes: i64) -> bool {
    minutes > 0 && minutes <= REMINDER_WINDOW_MINS
}

/// Identity of one sent reminder: at most one reminder fires per tuple
/// across the life of the dedup set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReminderKey {
    pub appointment_id: DbId,
    pub recipient_id: DbId,
    pub date: NaiveDate,
}

/// In-memory record of already-fired reminder tuples.
///
/// Self-bounding: once the set grows past `max`, [`shrink`](Self::shrink)
/// clears it, trading perfect dedup for bounded memory. Acceptable because
/// the reminder window is short relative to the clearing cadence.
#[derive(Debug)]
pub struct ReminderDedup {
    seen: HashSet<ReminderKey>,
    max: usize,
}

impl ReminderDedup {
    pub fn new(max: usize) -> Self {
        Self {
            seen: HashSet::new(),
            max,
        }
    }

    /// Claim a tuple for sending. Returns `true` the first time the key is
    /// seen, `false` on every repeat.
    pub fn claim(&mut self, key: ReminderKey) -> bool {
        self.seen.insert(key)
    }

    /// Clear the set if it has grown past its bound. Returns whether a
    /// clear happened; callers invoke this once at the end of a run.
    pub fn shrink(&mut self) -> bool {
        if self.seen.len() > self.max {
            self.seen.clear();
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for ReminderDedup {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key(appointment_id: DbId, recipient_id: DbId) -> ReminderKey {
        ReminderKey {
            appointment_id,
            recipient_id,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        }
    }

    #[test]
    fn window_boundaries() {
        assert!(!in_reminder_window(0));
        assert!(!in_reminder_window(-5));
        assert!(in_reminder_window(1));
        assert!(in_reminder_window(50));
        assert!(in_reminder_window(65));
        assert!(!in_reminder_window(66));
    }

    #[test]
    fn claim_fires_once_per_tuple() {
        let mut dedup = ReminderDedup::default();
        assert!(dedup.claim(key(1, 1)));
        assert!(!dedup.claim(key(1, 1)));
        // Different recipient for the same appointment is a distinct tuple.
        assert!(dedup.claim(key(1, 2)));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn shrink_clears_only_past_bound() {
        let mut dedup = ReminderDedup::new(3);
        for i in 0..3 {
            dedup.claim(key(i, 1));
        }
        assert!(!dedup.shrink());
        assert_eq!(dedup.len(), 3);

        dedup.claim(key(99, 1));
        assert!(dedup.shrink());
        assert!(dedup.is_empty());

        // After a clear the same tuple may fire again; the bound trades
        // perfect dedup for bounded memory.
        assert!(dedup.claim(key(0, 1)));
    }

    #[test]
    fn brisbane_appointment_fifty_minutes_out() {
        // Appointment 2024-06-01 09:00 in Australia/Brisbane (UTC+10,
        // no DST), observed at 08:10 local.
        let tz: Tz = "Australia/Brisbane".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();

        let instant = appointment_instant(date, start, tz).unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 5, 31, 23, 0, 0).unwrap());

        let now = instant - Duration::minutes(50);
        let mins = minutes_until(now, instant);
        assert_eq!(mins, 50);
        assert!(in_reminder_window(mins));
    }

    #[test]
    fn unset_or_invalid_timezone_falls_back() {
        assert_eq!(resolve_timezone(None), DEFAULT_TIMEZONE);
        assert_eq!(resolve_timezone(Some("Not/AZone")), DEFAULT_TIMEZONE);
        assert_eq!(
            resolve_timezone(Some("Pacific/Auckland")),
            chrono_tz::Pacific::Auckland
        );
    }

    #[test]
    fn lookahead_spans_today_and_tomorrow_local() {
        let tz: Tz = "Australia/Brisbane".parse().unwrap();
        // 2024-06-01 23:30 UTC is already 2024-06-02 09:30 in Brisbane.
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 23, 30, 0).unwrap();
        let dates = lookahead_dates(now, tz);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert_eq!(dates[1], NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
    }
}
