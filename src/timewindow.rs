//! Civil-day windows in the reference timezone
//!
//! A [`DayWindow`] is the half-open interval `[start, end)` between two local
//! midnights of the reference timezone, expressed as UTC instants. Around
//! daylight-saving transitions a window spans 23 or 25 hours, so callers
//! must never assume 48 half-hour slots.

use crate::error::{AgileViewError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Length of one tariff slot
pub const SLOT_MINUTES: i64 = 30;

/// Half-open interval of absolute instants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Build a window, rejecting empty or inverted bounds
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(AgileViewError::validation(
                "window",
                &format!("end {} is not after start {}", end, start),
            ));
        }
        Ok(Self { start, end })
    }

    /// Whether `t` lies in `[start, end)`
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Number of whole half-hour slots in the window
    pub fn slot_count(&self) -> usize {
        usize::try_from(self.duration().num_minutes() / SLOT_MINUTES).unwrap_or(0)
    }
}

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        match self.now.write() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Calendar date of `t` in the reference timezone
pub fn local_date(tz: Tz, t: DateTime<Utc>) -> NaiveDate {
    t.with_timezone(&tz).date_naive()
}

/// Wall-clock hour of `t` in the reference timezone
pub fn local_hour(tz: Tz, t: DateTime<Utc>) -> u32 {
    t.with_timezone(&tz).hour()
}

/// Whether two instants fall on the same civil day
pub fn same_local_day(tz: Tz, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    local_date(tz, a) == local_date(tz, b)
}

/// Map a local wall-clock time to an instant. Ambiguous times take the
/// earlier instant; times inside a spring-forward gap move to the first
/// valid hour after it.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    (0..4).find_map(|shift| {
        let candidate = local.checked_add_signed(TimeDelta::hours(shift))?;
        tz.from_local_datetime(&candidate)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// First instant of `date` in the reference timezone
pub fn start_of_local_day(tz: Tz, date: NaiveDate) -> Result<DateTime<Utc>> {
    resolve_local(tz, date.and_time(NaiveTime::MIN)).ok_or_else(|| {
        AgileViewError::validation("date", &format!("no local midnight for {}", date))
    })
}

/// Instant of `hour:00` local time on `date`
pub fn at_local_hour(tz: Tz, date: NaiveDate, hour: u32) -> Result<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0)
        .ok_or_else(|| AgileViewError::validation("hour", &format!("invalid hour {}", hour)))?;
    resolve_local(tz, date.and_time(time)).ok_or_else(|| {
        AgileViewError::validation("date", &format!("no local {}:00 on {}", hour, date))
    })
}

/// Window of the civil day `offset_days` after the current one, as seen at `now`
pub fn day_window_at(tz: Tz, now: DateTime<Utc>, offset_days: i64) -> Result<DayWindow> {
    let today = local_date(tz, now);
    let day = today
        .checked_add_signed(TimeDelta::days(offset_days))
        .ok_or_else(|| AgileViewError::validation("offset", "day offset out of range"))?;
    let next = day
        .succ_opt()
        .ok_or_else(|| AgileViewError::validation("offset", "day offset out of range"))?;
    DayWindow::new(start_of_local_day(tz, day)?, start_of_local_day(tz, next)?)
}

/// Window of "today + offset" according to `clock`
pub fn day_window(tz: Tz, clock: &dyn Clock, offset_days: i64) -> Result<DayWindow> {
    day_window_at(tz, clock.now(), offset_days)
}

/// Move an instant by whole civil days, keeping its local wall-clock time
pub fn shift_days(tz: Tz, t: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    let local = t.with_timezone(&tz).naive_local();
    let shifted = local
        .checked_add_signed(TimeDelta::days(days))
        .ok_or_else(|| AgileViewError::validation("days", "shift out of range"))?;
    resolve_local(tz, shifted)
        .ok_or_else(|| AgileViewError::validation("days", "shift lands outside the calendar"))
}
