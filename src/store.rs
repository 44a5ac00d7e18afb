//! Series cache store
//!
//! Points are keyed by `(series, valid_from)`. Re-inserting a point
//! overwrites its value; every `upsert` call is applied atomically so a
//! following query never sees half of a batch.

use crate::config::StorageConfig;
use crate::error::{AgileViewError, Result};
use crate::series::{SeriesKey, TimePoint};
use crate::timewindow::DayWindow;
use std::sync::Arc;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persistent ordered store of time points per series
#[async_trait::async_trait]
pub trait SeriesStore: Send + Sync {
    /// Points with `valid_from` in `[window.start, window.end)`, ascending
    async fn query_range(&self, key: &SeriesKey, window: &DayWindow) -> Result<Vec<TimePoint>>;

    /// Points whose validity period overlaps the window, ascending.
    /// Open-ended points cover everything after their start.
    async fn query_covering(&self, key: &SeriesKey, window: &DayWindow)
    -> Result<Vec<TimePoint>>;

    /// Insert or overwrite each point, all or nothing
    async fn upsert(&self, key: &SeriesKey, points: &[TimePoint]) -> Result<()>;

    /// Point with the greatest `valid_from`
    async fn latest(&self, key: &SeriesKey) -> Result<Option<TimePoint>>;
}

/// Whether a stored point overlaps `window`
pub(crate) fn covers(point: &TimePoint, window: &DayWindow) -> bool {
    point.valid_from < window.end && point.valid_to.is_none_or(|to| to > window.start)
}

/// Open the backend named in configuration
pub fn open_store(cfg: &StorageConfig) -> Result<Arc<dyn SeriesStore>> {
    match cfg.backend.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "sqlite" => Ok(Arc::new(SqliteStore::open(&cfg.path)?)),
        other => Err(AgileViewError::config(format!(
            "unknown storage backend {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn covering_handles_open_ended_points() {
        let window = DayWindow::new(utc("2025-01-15T00:00:00Z"), utc("2025-01-16T00:00:00Z")).unwrap();
        let open = TimePoint {
            valid_from: utc("2024-10-01T00:00:00Z"),
            valid_to: None,
            value: 48.0,
        };
        let ended = TimePoint {
            valid_to: Some(utc("2025-01-15T00:00:00Z")),
            ..open
        };
        let future = TimePoint {
            valid_from: utc("2025-01-16T00:00:00Z"),
            ..open
        };
        assert!(covers(&open, &window));
        assert!(!covers(&ended, &window));
        assert!(!covers(&future, &window));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let cfg = StorageConfig {
            backend: "redis".into(),
            path: String::new(),
        };
        assert!(open_store(&cfg).is_err());
    }
}
