//! Cache sufficiency decisions
//!
//! Pure functions of the cached count, the window and the current time, so
//! every branch can be tested without a store or a fetcher.

use crate::config::SyncConfig;
use crate::series::{Granularity, SeriesProfile, SufficiencyRule};
use crate::timewindow::{DayWindow, local_hour, same_local_day};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Why a cached window was or was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SufficiencyReason {
    /// First load of a session always checks the provider
    InitialLoad,
    /// Exactly the expected number of intervals is cached
    Complete,
    /// Today with at most the tolerated number of trailing gaps
    TodayPartial,
    /// Future day after publication time; nothing more will appear today
    AwaitingPublication,
    /// Count mismatch
    Incomplete { have: usize, expected: usize },
    /// Standing charge already cached for the window
    StandingCached,
    /// No standing charge cached for the window
    StandingMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sufficiency {
    pub sufficient: bool,
    #[serde(flatten)]
    pub reason: SufficiencyReason,
}

impl Sufficiency {
    const fn accept(reason: SufficiencyReason) -> Self {
        Self {
            sufficient: true,
            reason,
        }
    }

    const fn reject(reason: SufficiencyReason) -> Self {
        Self {
            sufficient: false,
            reason,
        }
    }
}

/// Intervals a complete window holds for the given granularity
pub fn expected_count(granularity: Granularity, window: &DayWindow) -> usize {
    match granularity {
        Granularity::HalfHour => window.slot_count(),
        Granularity::Daily => 1,
    }
}

/// Decide whether `cached` points satisfy `window`
pub fn assess(
    profile: SeriesProfile,
    cached: usize,
    window: &DayWindow,
    initial: bool,
    now: DateTime<Utc>,
    tz: Tz,
    cfg: &SyncConfig,
) -> Sufficiency {
    if profile.rule == SufficiencyRule::ZeroOnly {
        // Never refreshed once cached, so a tariff change mid-window is missed
        return if cached == 0 {
            Sufficiency::reject(SufficiencyReason::StandingMissing)
        } else {
            Sufficiency::accept(SufficiencyReason::StandingCached)
        };
    }

    if initial {
        return Sufficiency::reject(SufficiencyReason::InitialLoad);
    }

    let expected = expected_count(profile.granularity, window);
    if cached == expected {
        return Sufficiency::accept(SufficiencyReason::Complete);
    }

    if same_local_day(tz, window.start, now)
        && cached >= expected.saturating_sub(cfg.partial_day_tolerance)
    {
        return Sufficiency::accept(SufficiencyReason::TodayPartial);
    }

    if window.start > now && local_hour(tz, now) >= cfg.publish_hour {
        return Sufficiency::accept(SufficiencyReason::AwaitingPublication);
    }

    Sufficiency::reject(SufficiencyReason::Incomplete {
        have: cached,
        expected,
    })
}
