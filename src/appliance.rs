//! Appliance run scheduling
//!
//! Picks the cheapest contiguous run of upcoming half-hour prices for an
//! appliance and prices it.

use crate::error::{AgileViewError, Result};
use crate::metrics::cheapest_window;
use crate::series::TimePoint;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum appliances tracked at once
pub const MAX_APPLIANCES: usize = 8;
pub const MAX_POWER_W: u32 = 20_000;
pub const MAX_RUN_HOURS: u32 = 16;

const EPS: f64 = f64::EPSILON;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTime {
    pub hours: u32,
    pub minutes: u32,
}

impl RunTime {
    /// Half-hour slots needed, partial slots rounded up
    pub const fn intervals(self) -> usize {
        (self.hours * 2 + self.minutes.div_ceil(30)) as usize
    }

    fn as_hours(self) -> f64 {
        f64::from(self.hours) + f64::from(self.minutes) / 60.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appliance {
    pub id: Uuid,
    pub name: String,
    pub power_w: u32,
    pub run_time: RunTime,
}

impl Appliance {
    /// Validated appliance with a fresh id
    pub fn new(name: &str, power_w: u32, hours: u32, minutes: u32) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AgileViewError::validation("name", "Name cannot be empty"));
        }
        if power_w > MAX_POWER_W {
            return Err(AgileViewError::validation(
                "power_w",
                &format!("Must be within 0..={}", MAX_POWER_W),
            ));
        }
        if hours > MAX_RUN_HOURS {
            return Err(AgileViewError::validation(
                "hours",
                &format!("Must be within 0..={}", MAX_RUN_HOURS),
            ));
        }
        if minutes > 59 {
            return Err(AgileViewError::validation("minutes", "Must be within 0..=59"));
        }
        if hours == 0 && minutes == 0 {
            return Err(AgileViewError::validation("run_time", "Run time must be positive"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            power_w,
            run_time: RunTime { hours, minutes },
        })
    }
}

/// Signed wait until the suggested start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delay {
    pub hours: i64,
    pub minutes: i64,
}

/// Suggested run of one appliance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplianceEstimate {
    pub appliance_id: Uuid,
    pub start_at: DateTime<Utc>,
    /// Weekday and local time, e.g. `Wed 13:30`
    pub start_label: String,
    pub delay: Delay,
    /// Average unit price over the run (p/kWh)
    pub average_price: f64,
    /// Run cost in pence, one decimal
    pub cost: f64,
    /// Tomorrow's prices were not yet published
    pub warning: bool,
}

/// Delay from `now` to `start`, minutes rounded to the nearest half hour
pub fn delay_start(start: DateTime<Utc>, now: DateTime<Utc>) -> Delay {
    let diff_ms = (start - now).num_milliseconds();
    let mut hours = diff_ms.div_euclid(3_600_000);
    let rest = diff_ms - hours * 3_600_000;
    let mut minutes = ((rest.div_euclid(60_000) as f64 / 30.0).round() as i64) * 30;
    if minutes == 60 {
        hours += 1;
        minutes = 0;
    }
    if hours < 0 {
        hours += 24;
    }
    Delay { hours, minutes }
}

/// Cheapest run for `appliance` among `upcoming` price slots (ascending,
/// none before `now`). `None` when too few slots are known.
pub fn estimate(
    appliance: &Appliance,
    upcoming: &[TimePoint],
    now: DateTime<Utc>,
    tz: Tz,
    next_available: bool,
) -> Option<ApplianceEstimate> {
    let intervals = appliance.run_time.intervals();
    let prices: Vec<f64> = upcoming.iter().map(|p| p.value).collect();
    let window = cheapest_window(&prices, intervals)?;
    let start_at = upcoming.get(window.start_index)?.valid_from;

    let average_price = (window.sum * 100.0 + EPS).round() / (100.0 * intervals as f64);
    let kw = f64::from(appliance.power_w) / 1000.0;
    let cost = (average_price * kw * appliance.run_time.as_hours() * 10.0 + EPS).round() / 10.0;

    Some(ApplianceEstimate {
        appliance_id: appliance.id,
        start_at,
        start_label: start_at.with_timezone(&tz).format("%a %H:%M").to_string(),
        delay: delay_start(start_at, now),
        average_price,
        cost,
        warning: !next_available,
    })
}

/// Appliances of one session
#[derive(Debug, Clone, Default)]
pub struct ApplianceBook {
    items: Vec<Appliance>,
}

impl ApplianceBook {
    pub fn add(&mut self, appliance: Appliance) -> Result<()> {
        if self.items.len() >= MAX_APPLIANCES {
            return Err(AgileViewError::validation(
                "appliances",
                &format!("At most {} appliances", MAX_APPLIANCES),
            ));
        }
        self.items.push(appliance);
        Ok(())
    }

    /// Remove by id; false when unknown
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|a| a.id != id);
        self.items.len() != before
    }

    pub fn list(&self) -> &[Appliance] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use chrono_tz::Europe::London;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn slots(start: &str, prices: &[f64]) -> Vec<TimePoint> {
        let start = utc(start);
        prices
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let from = start + TimeDelta::minutes(30 * i as i64);
                TimePoint {
                    valid_from: from,
                    valid_to: Some(from + TimeDelta::minutes(30)),
                    value: *v,
                }
            })
            .collect()
    }

    #[test]
    fn intervals_round_partial_slots_up() {
        assert_eq!(RunTime { hours: 2, minutes: 30 }.intervals(), 5);
        assert_eq!(RunTime { hours: 1, minutes: 1 }.intervals(), 3);
        assert_eq!(RunTime { hours: 0, minutes: 59 }.intervals(), 2);
    }

    #[test]
    fn validation_limits() {
        assert!(Appliance::new("Dryer", 20_001, 1, 0).is_err());
        assert!(Appliance::new("Dryer", 2000, 17, 0).is_err());
        assert!(Appliance::new("Dryer", 2000, 1, 60).is_err());
        assert!(Appliance::new(" ", 2000, 1, 0).is_err());
        assert!(Appliance::new("Dryer", 2000, 0, 0).is_err());
        assert!(Appliance::new("Dryer", 20_000, 16, 59).is_ok());
    }

    #[test]
    fn book_caps_at_eight() {
        let mut book = ApplianceBook::default();
        for i in 0..MAX_APPLIANCES {
            book.add(Appliance::new(&format!("a{}", i), 100, 1, 0).unwrap())
                .unwrap();
        }
        assert!(book.add(Appliance::new("extra", 100, 1, 0).unwrap()).is_err());
        let id = book.list()[0].id;
        assert!(book.remove(id));
        assert!(!book.remove(id));
        assert_eq!(book.list().len(), MAX_APPLIANCES - 1);
    }

    #[test]
    fn delay_rounds_to_half_hours() {
        let now = utc("2025-01-15T10:00:00Z");
        let d = delay_start(utc("2025-01-15T13:44:00Z"), now);
        assert_eq!(d, Delay { hours: 3, minutes: 30 });
        let d = delay_start(utc("2025-01-15T13:50:00Z"), now);
        assert_eq!(d, Delay { hours: 4, minutes: 0 });
        let d = delay_start(utc("2025-01-15T10:10:00Z"), now);
        assert_eq!(d, Delay { hours: 0, minutes: 0 });
    }

    #[test]
    fn estimate_picks_cheapest_run() {
        let now = utc("2025-01-15T10:05:00Z");
        let upcoming = slots("2025-01-15T10:30:00Z", &[30.0, 20.0, 10.0, 12.0, 40.0]);
        let appliance = Appliance::new("Dishwasher", 2000, 1, 0).unwrap();
        let e = estimate(&appliance, &upcoming, now, London, true).unwrap();
        assert_eq!(e.start_at, utc("2025-01-15T11:30:00Z"));
        assert_eq!(e.start_label, "Wed 11:30");
        assert_eq!(e.average_price, 11.0);
        assert_eq!(e.cost, 22.0);
        assert_eq!(e.delay, Delay { hours: 1, minutes: 30 });
        assert!(!e.warning);
    }

    #[test]
    fn estimate_needs_enough_slots() {
        let now = utc("2025-01-15T10:05:00Z");
        let upcoming = slots("2025-01-15T10:30:00Z", &[30.0]);
        let appliance = Appliance::new("Oven", 2000, 1, 0).unwrap();
        assert!(estimate(&appliance, &upcoming, now, London, false).is_none());
    }
}
