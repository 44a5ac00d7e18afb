use crate::error::Result;
use crate::series::{SeriesKey, TimePoint};
use crate::store::{SeriesStore, covers};
use crate::timewindow::DayWindow;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

type Series = BTreeMap<DateTime<Utc>, TimePoint>;

/// Process-local store, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    series: RwLock<HashMap<String, Series>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SeriesStore for MemoryStore {
    async fn query_range(&self, key: &SeriesKey, window: &DayWindow) -> Result<Vec<TimePoint>> {
        let guard = self.series.read().await;
        Ok(guard
            .get(&key.storage_key())
            .map(|s| s.range(window.start..window.end).map(|(_, p)| *p).collect())
            .unwrap_or_default())
    }

    async fn query_covering(
        &self,
        key: &SeriesKey,
        window: &DayWindow,
    ) -> Result<Vec<TimePoint>> {
        let guard = self.series.read().await;
        Ok(guard
            .get(&key.storage_key())
            .map(|s| {
                s.range(..window.end)
                    .map(|(_, p)| *p)
                    .filter(|p| covers(p, window))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert(&self, key: &SeriesKey, points: &[TimePoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let mut guard = self.series.write().await;
        let series = guard.entry(key.storage_key()).or_default();
        for point in points {
            series.insert(point.valid_from, *point);
        }
        Ok(())
    }

    async fn latest(&self, key: &SeriesKey) -> Result<Option<TimePoint>> {
        let guard = self.series.read().await;
        Ok(guard
            .get(&key.storage_key())
            .and_then(|s| s.last_key_value().map(|(_, p)| *p)))
    }
}
