//! Slot availability engine.
//!
//! Offerable start times are a pure function of the clock and the shop's
//! opening hours: every `interval` minutes inside the daily window, never later
//! than `close - buffer`, never earlier than now, and never more than 24 hours
//! ahead. Existing bookings are not consulted here.
//!
//! Windows whose closing time is earlier than the opening time run overnight;
//! times after midnight and before close belong to the previous day's window.
//!
//! ```
//! use chairbook_core::slots::{generate_slots, SlotRules};
//! use chrono::NaiveDate;
//!
//! let now = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap().and_hms_opt(18, 46, 0).unwrap();
//! let slots = generate_slots(now, "09:00", "19:00", SlotRules::default());
//! assert_eq!(slots[0], NaiveDate::from_ymd_opt(2025, 3, 15).unwrap().and_hms_opt(9, 0, 0).unwrap());
//! ```

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How far ahead slots are offered
pub const HORIZON_HOURS: i64 = 24;

/// Slot grid and closing buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRules {
    /// Minutes between consecutive slots
    pub interval_minutes: u32,
    /// Minutes before closing during which no slot may start
    pub buffer_minutes: u32,
}

impl SlotRules {
    /// Creates rules with the given interval and buffer
    #[must_use]
    pub const fn new(interval_minutes: u32, buffer_minutes: u32) -> Self {
        Self {
            interval_minutes,
            buffer_minutes,
        }
    }
}

impl Default for SlotRules {
    fn default() -> Self {
        Self::new(30, 30)
    }
}

/// Parses a local `HH:MM` (or `H:MM`, or bare `HH`) clock time.
#[must_use]
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    let (hours, minutes) = value.split_once(':').unwrap_or((value, "0"));
    let hours: u32 = hours.trim().parse().ok()?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Rounds `at` up to the next multiple of `interval_minutes` past midnight.
///
/// Already-aligned instants (to the second) are returned unchanged.
#[must_use]
pub fn ceil_to_interval(at: NaiveDateTime, interval_minutes: u32) -> NaiveDateTime {
    let step = i64::from(interval_minutes.max(1)) * 60;
    let time = at.time();
    let mut secs = i64::from(time.num_seconds_from_midnight());
    if time.nanosecond() > 0 {
        secs += 1;
    }
    let remainder = secs % step;
    let aligned = if remainder == 0 { secs } else { secs + step - remainder };
    day_start(at.date()) + Duration::seconds(aligned)
}

/// Offerable slot start times between `now` and `now + 24h`.
///
/// Unparsable hours and zero-width windows yield an empty list: that is "no
/// availability", not an error. The result is ordered and free of duplicates.
#[must_use]
pub fn generate_slots(
    now: NaiveDateTime,
    open: &str,
    close: &str,
    rules: SlotRules,
) -> Vec<NaiveDateTime> {
    let (Some(open), Some(close)) = (parse_clock(open), parse_clock(close)) else {
        return Vec::new();
    };
    if open == close || rules.interval_minutes == 0 {
        return Vec::new();
    }

    let window = DailyWindow {
        open,
        close,
        buffer: Duration::minutes(i64::from(rules.buffer_minutes)),
    };
    let interval = Duration::minutes(i64::from(rules.interval_minutes));
    let horizon_end = now + Duration::hours(HORIZON_HOURS);

    let mut slots = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = ceil_to_interval(now, rules.interval_minutes);

    while cursor <= horizon_end {
        let day = window.anchor_day(cursor);
        let (open_at, last_bookable) = window.bounds(day);

        if cursor < open_at {
            cursor = open_at;
        }

        if cursor > last_bookable {
            let next_open = day_start(day + Duration::days(1)) + since_midnight(window.open);
            cursor = ceil_to_interval(next_open, rules.interval_minutes);
            continue;
        }

        if cursor > horizon_end {
            break;
        }

        if seen.insert(cursor) {
            slots.push(cursor);
        }
        cursor += interval;
    }

    slots
}

/// Returns true when `candidate` is one of the slots offerable at `now`.
#[must_use]
pub fn is_offerable(
    candidate: NaiveDateTime,
    now: NaiveDateTime,
    open: &str,
    close: &str,
    rules: SlotRules,
) -> bool {
    generate_slots(now, open, close, rules).contains(&candidate)
}

struct DailyWindow {
    open: NaiveTime,
    close: NaiveTime,
    buffer: Duration,
}

impl DailyWindow {
    fn is_overnight(&self) -> bool {
        self.close < self.open
    }

    /// Calendar day whose window `at` falls under.
    fn anchor_day(&self, at: NaiveDateTime) -> NaiveDate {
        if self.is_overnight() && at.time() < self.close {
            at.date() - Duration::days(1)
        } else {
            at.date()
        }
    }

    /// Opening instant and last bookable instant for the window starting on `day`.
    fn bounds(&self, day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let open_at = day_start(day) + since_midnight(self.open);
        let close_day = if self.is_overnight() {
            day + Duration::days(1)
        } else {
            day
        };
        let close_at = day_start(close_day) + since_midnight(self.close);
        (open_at, close_at - self.buffer)
    }
}

fn day_start(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

fn since_midnight(time: NaiveTime) -> Duration {
    Duration::seconds(i64::from(time.num_seconds_from_midnight()))
}
