//! Day synchronizer
//!
//! Serves a single civil-day window of one series from the cache, fetching
//! from the provider only when the cached rows are judged insufficient. The
//! fetch range is widened in the scroll direction so that consecutive
//! navigation steps are answered from the cache.
//!
//! Provider failures never escape: they are logged and the cached rows are
//! returned as they are. Only storage faults are propagated.

use crate::config::SyncConfig;
use crate::error::{AgileViewError, Result};
use crate::fetcher::{FetchRange, SeriesFetcher};
use crate::logging::{StructuredLogger, get_logger};
use crate::series::{Granularity, Region, SeriesKey, TimePoint, normalize};
use crate::store::SeriesStore;
use crate::timewindow::{Clock, DayWindow, at_local_hour, day_window, local_date, same_local_day, shift_days};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

mod sufficiency;

pub use sufficiency::{Sufficiency, SufficiencyReason, assess, expected_count};

/// Scroll direction of the navigation that triggered a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    #[default]
    Right,
}

/// Why a consumption window came back empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoDataKind {
    /// Today's readings have not arrived yet
    Transient,
    /// Any other day; no readings are expected
    Permanent,
}

/// One synchronisation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub key: SeriesKey,
    pub window: DayWindow,
    pub initial: bool,
    pub direction: Direction,
}

impl SyncRequest {
    pub const fn new(key: SeriesKey, window: DayWindow, initial: bool, direction: Direction) -> Self {
        Self {
            key,
            window,
            initial,
            direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Points(Vec<TimePoint>),
    NoData(NoDataKind),
}

impl SyncOutcome {
    /// Points of the window; empty for `NoData`
    pub fn into_points(self) -> Vec<TimePoint> {
        match self {
            Self::Points(points) => points,
            Self::NoData(_) => Vec::new(),
        }
    }

    pub fn values(&self) -> Vec<f64> {
        match self {
            Self::Points(points) => points.iter().map(|p| p.value).collect(),
            Self::NoData(_) => Vec::new(),
        }
    }
}

/// Cache-first synchronizer shared by every series kind
pub struct DaySynchronizer {
    store: Arc<dyn SeriesStore>,
    fetcher: Arc<dyn SeriesFetcher>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    cfg: SyncConfig,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    logger: StructuredLogger,
}

impl DaySynchronizer {
    pub fn new(
        store: Arc<dyn SeriesStore>,
        fetcher: Arc<dyn SeriesFetcher>,
        clock: Arc<dyn Clock>,
        tz: Tz,
        cfg: SyncConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            clock,
            tz,
            cfg,
            in_flight: Mutex::new(HashMap::new()),
            logger: get_logger("sync"),
        }
    }

    pub const fn tz(&self) -> Tz {
        self.tz
    }

    pub const fn config(&self) -> &SyncConfig {
        &self.cfg
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Window of "today + offset" in the reference timezone
    pub fn window(&self, offset_days: i64) -> Result<DayWindow> {
        day_window(self.tz, self.clock.as_ref(), offset_days)
    }

    /// Serve `req.window` for `req.key`, fetching first when the cache is
    /// insufficient
    pub async fn sync(&self, req: &SyncRequest) -> Result<SyncOutcome> {
        let storage_key = req.key.storage_key();
        let logger = self.logger.for_series(&storage_key);

        // Serialise syncs of the same series; the later caller re-reads the
        // cache after the earlier one has upserted
        let key_lock = self.key_lock(&storage_key).await;
        let _held = key_lock.lock().await;

        let profile = req.key.profile();
        let cached = self.query(&req.key, &req.window).await?;
        let now = self.clock.now();
        let verdict = assess(
            profile,
            cached.len(),
            &req.window,
            req.initial,
            now,
            self.tz,
            &self.cfg,
        );

        let points = if verdict.sufficient {
            logger.trace(&format!("cache hit ({:?}, {} points)", verdict.reason, cached.len()));
            cached
        } else {
            logger.debug(&format!("cache insufficient: {:?}", verdict.reason));
            let range = self.fetch_range(req)?;
            if self.refresh(&req.key, range, &logger).await? {
                self.query(&req.key, &req.window).await?
            } else {
                cached
            }
        };

        if points.is_empty() && profile.reports_no_data {
            let kind = if same_local_day(self.tz, req.window.start, now) {
                NoDataKind::Transient
            } else {
                NoDataKind::Permanent
            };
            logger.info(&format!("no data for {} ({:?})", req.window.start, kind));
            return Ok(SyncOutcome::NoData(kind));
        }

        Ok(SyncOutcome::Points(points))
    }

    /// Range requested from the provider: the window widened by whole days
    /// in the scroll direction
    pub fn fetch_range(&self, req: &SyncRequest) -> Result<FetchRange> {
        let span = i64::from(if req.initial {
            self.cfg.initial_span_days
        } else {
            self.cfg.scroll_span_days
        });
        Ok(match req.direction {
            Direction::Left => FetchRange::new(
                shift_days(self.tz, req.window.start, -span)?,
                req.window.end,
            ),
            Direction::Right => FetchRange::new(
                req.window.start,
                shift_days(self.tz, req.window.end, span)?,
            ),
        })
    }

    /// Whether tomorrow's prices for `region` are cached: the latest stored
    /// slot must start after the configured hour of tomorrow
    pub async fn next_available(&self, region: Region) -> Result<bool> {
        let Some(latest) = self.store.latest(&SeriesKey::Price(region)).await? else {
            return Ok(false);
        };
        let tomorrow = local_date(self.tz, self.clock.now())
            .succ_opt()
            .ok_or_else(|| AgileViewError::validation("date", "no day after today"))?;
        let threshold = at_local_hour(self.tz, tomorrow, self.cfg.next_available_hour)?;
        Ok(latest.valid_from > threshold)
    }

    async fn query(&self, key: &SeriesKey, window: &DayWindow) -> Result<Vec<TimePoint>> {
        match key.profile().granularity {
            Granularity::HalfHour => self.store.query_range(key, window).await,
            Granularity::Daily => self.store.query_covering(key, window).await,
        }
    }

    /// Fetch and upsert; `Ok(false)` when the provider failed
    async fn refresh(&self, key: &SeriesKey, range: FetchRange, logger: &StructuredLogger) -> Result<bool> {
        let logger = logger.with_field(
            "range",
            format!("{}..{}", range.period_from.to_rfc3339(), range.period_to.to_rfc3339()),
        );
        let raw = match self.fetcher.fetch(key, range).await {
            Ok(raw) => raw,
            Err(e) => {
                logger.warn(&format!("fetch failed, serving cache: {}", e));
                return Ok(false);
            }
        };

        let normalized = normalize(key, &raw, &range);
        if normalized.skipped > 0 {
            logger.debug(&format!("skipped {} unparsable records", normalized.skipped));
        }
        self.store.upsert(key, &normalized.points).await?;
        logger.debug(&format!("upserted {} points", normalized.points.len()));
        Ok(true)
    }

    async fn key_lock(&self, storage_key: &str) -> Arc<Mutex<()>> {
        let mut map = self.in_flight.lock().await;
        Arc::clone(map.entry(storage_key.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::RawPoint;
    use crate::store::MemoryStore;
    use crate::timewindow::FixedClock;
    use chrono_tz::Europe::London;

    struct Failing;

    #[async_trait::async_trait]
    impl SeriesFetcher for Failing {
        async fn fetch(&self, _key: &SeriesKey, _range: FetchRange) -> Result<Vec<RawPoint>> {
            Err(AgileViewError::network("connection refused"))
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn synchronizer(now: &str) -> DaySynchronizer {
        DaySynchronizer::new(
            Arc::new(MemoryStore::new()),
            Arc::new(Failing),
            Arc::new(FixedClock::new(utc(now))),
            London,
            SyncConfig::default(),
        )
    }

    #[test]
    fn widening_follows_direction() {
        let s = synchronizer("2025-01-15T10:00:00Z");
        let window = s.window(0).unwrap();
        let left = s
            .fetch_range(&SyncRequest::new(SeriesKey::Price(Region::A), window, false, Direction::Left))
            .unwrap();
        assert_eq!(left.period_to, window.end);
        assert_eq!(left.period_from, utc("2024-12-16T00:00:00Z"));

        let right = s
            .fetch_range(&SyncRequest::new(SeriesKey::Price(Region::A), window, true, Direction::Right))
            .unwrap();
        assert_eq!(right.period_from, window.start);
        assert_eq!(right.period_to, utc("2025-01-19T00:00:00Z"));
    }

    #[tokio::test]
    async fn fetch_failure_is_not_an_error() {
        let s = synchronizer("2025-01-15T10:00:00Z");
        let window = s.window(0).unwrap();
        let out = s
            .sync(&SyncRequest::new(SeriesKey::Price(Region::A), window, true, Direction::Right))
            .await
            .unwrap();
        assert_eq!(out, SyncOutcome::Points(Vec::new()));
    }

    #[tokio::test]
    async fn empty_consumption_reports_no_data_kind() {
        let s = synchronizer("2025-01-15T10:00:00Z");
        let today = SyncRequest::new(SeriesKey::Consumption, s.window(0).unwrap(), false, Direction::Left);
        assert_eq!(s.sync(&today).await.unwrap(), SyncOutcome::NoData(NoDataKind::Transient));
        let past = SyncRequest::new(SeriesKey::Consumption, s.window(-2).unwrap(), false, Direction::Left);
        assert_eq!(s.sync(&past).await.unwrap(), SyncOutcome::NoData(NoDataKind::Permanent));
    }

    #[tokio::test]
    async fn next_available_needs_tomorrow_afternoon() {
        let store = Arc::new(MemoryStore::new());
        let s = DaySynchronizer::new(
            store.clone(),
            Arc::new(Failing),
            Arc::new(FixedClock::new(utc("2025-01-15T17:00:00Z"))),
            London,
            SyncConfig::default(),
        );
        let key = SeriesKey::Price(Region::A);
        assert!(!s.next_available(Region::A).await.unwrap());

        let noon = TimePoint {
            valid_from: utc("2025-01-16T12:00:00Z"),
            valid_to: Some(utc("2025-01-16T12:30:00Z")),
            value: 20.0,
        };
        store.upsert(&key, &[noon]).await.unwrap();
        assert!(!s.next_available(Region::A).await.unwrap());

        let late = TimePoint {
            valid_from: utc("2025-01-16T22:30:00Z"),
            valid_to: Some(utc("2025-01-16T23:00:00Z")),
            value: 18.0,
        };
        store.upsert(&key, &[late]).await.unwrap();
        assert!(s.next_available(Region::A).await.unwrap());
    }
}
