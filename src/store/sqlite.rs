use crate::error::{AgileViewError, Result};
use crate::logging::get_logger;
use crate::series::{SeriesKey, TimePoint};
use crate::store::SeriesStore;
use crate::timewindow::DayWindow;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS series_points (
    series     TEXT    NOT NULL,
    valid_from INTEGER NOT NULL,
    valid_to   INTEGER,
    value      REAL    NOT NULL,
    PRIMARY KEY (series, valid_from)
) WITHOUT ROWID;
";

const UPSERT: &str = "
INSERT INTO series_points (series, valid_from, valid_to, value)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (series, valid_from)
DO UPDATE SET valid_to = excluded.valid_to, value = excluded.value
";

type Row = (i64, Option<i64>, f64);

/// SQLite-backed store; instants are stored as Unix milliseconds
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (and create if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        get_logger("store").info(&format!("Opened series cache at {}", path.display()));
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AgileViewError::storage("connection mutex poisoned"))?;
            f(&mut guard)
        })
        .await?
    }

    fn select(conn: &Connection, sql: &str, series: &str, a: i64, b: i64) -> Result<Vec<TimePoint>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params![series, a, b], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, Option<i64>>(1)?, r.get::<_, f64>(2)?))
            })?
            .collect::<rusqlite::Result<Vec<Row>>>()?;
        rows.into_iter().map(to_point).collect()
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| AgileViewError::storage(format!("stored instant {} out of range", ms)))
}

fn to_point((from, to, value): Row) -> Result<TimePoint> {
    Ok(TimePoint {
        valid_from: from_millis(from)?,
        valid_to: to.map(from_millis).transpose()?,
        value,
    })
}

#[async_trait::async_trait]
impl SeriesStore for SqliteStore {
    async fn query_range(&self, key: &SeriesKey, window: &DayWindow) -> Result<Vec<TimePoint>> {
        let series = key.storage_key();
        let (start, end) = (window.start.timestamp_millis(), window.end.timestamp_millis());
        self.with_conn(move |conn| {
            Self::select(
                conn,
                "SELECT valid_from, valid_to, value FROM series_points
                 WHERE series = ?1 AND valid_from >= ?2 AND valid_from < ?3
                 ORDER BY valid_from",
                &series,
                start,
                end,
            )
        })
        .await
    }

    async fn query_covering(
        &self,
        key: &SeriesKey,
        window: &DayWindow,
    ) -> Result<Vec<TimePoint>> {
        let series = key.storage_key();
        let (start, end) = (window.start.timestamp_millis(), window.end.timestamp_millis());
        self.with_conn(move |conn| {
            Self::select(
                conn,
                "SELECT valid_from, valid_to, value FROM series_points
                 WHERE series = ?1 AND valid_from < ?3
                   AND (valid_to IS NULL OR valid_to > ?2)
                 ORDER BY valid_from",
                &series,
                start,
                end,
            )
        })
        .await
    }

    async fn upsert(&self, key: &SeriesKey, points: &[TimePoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let series = key.storage_key();
        let rows: Vec<Row> = points
            .iter()
            .map(|p| {
                (
                    p.valid_from.timestamp_millis(),
                    p.valid_to.map(|t| t.timestamp_millis()),
                    p.value,
                )
            })
            .collect();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(UPSERT)?;
                for (from, to, value) in &rows {
                    stmt.execute(params![series, from, to, value])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn latest(&self, key: &SeriesKey) -> Result<Option<TimePoint>> {
        let series = key.storage_key();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT valid_from, valid_to, value FROM series_points
                     WHERE series = ?1 ORDER BY valid_from DESC LIMIT 1",
                    params![series],
                    |r| Ok((r.get::<_, i64>(0)?, r.get::<_, Option<i64>>(1)?, r.get::<_, f64>(2)?)),
                )
                .optional()?;
            row.map(to_point).transpose()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Region;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn upsert_overwrites_in_place() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = SeriesKey::Price(Region::A);
        let mut p = TimePoint {
            valid_from: utc("2025-01-15T00:00:00Z"),
            valid_to: Some(utc("2025-01-15T00:30:00Z")),
            value: 12.5,
        };
        store.upsert(&key, &[p]).await.unwrap();
        p.value = 13.0;
        store.upsert(&key, &[p]).await.unwrap();

        let window = DayWindow::new(utc("2025-01-15T00:00:00Z"), utc("2025-01-16T00:00:00Z")).unwrap();
        let rows = store.query_range(&key, &window).await.unwrap();
        assert_eq!(rows, vec![p]);
        assert_eq!(store.latest(&key).await.unwrap(), Some(p));
    }

    #[tokio::test]
    async fn series_do_not_leak_into_each_other() {
        let store = SqliteStore::open_in_memory().unwrap();
        let p = TimePoint {
            valid_from: utc("2025-01-15T00:00:00Z"),
            valid_to: None,
            value: 1.0,
        };
        store.upsert(&SeriesKey::Price(Region::A), &[p]).await.unwrap();
        assert!(store.latest(&SeriesKey::Price(Region::B)).await.unwrap().is_none());
        assert!(store.latest(&SeriesKey::Consumption).await.unwrap().is_none());
    }
}
