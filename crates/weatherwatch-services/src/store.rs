//! Durable reading storage.
//!
//! `ReadingStore` is synchronous like the other storage backends in this
//! workspace; async callers go through [`run_blocking`]. `SqliteReadingStore`
//! is the production backend, `InMemoryReadingStore` is a fake for tests and
//! embedding.

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use weatherwatch_core::{RusqliteErrorExt, StoreError};
use weatherwatch_weather::{DailySummary, Reading};

/// Append-only store of readings.
pub trait ReadingStore: Send + Sync {
    /// Append one reading. Committed before returning. Returns the row id.
    fn insert(&self, reading: &Reading) -> Result<i64, StoreError>;

    /// Reading with the greatest timestamp for `city`; later inserts win ties.
    fn latest(&self, city: &str) -> Result<Option<Reading>, StoreError>;

    /// All readings for `city`, newest first.
    fn history(&self, city: &str) -> Result<History, StoreError>;

    /// Newest reading across every city.
    fn latest_overall(&self) -> Result<Option<Reading>, StoreError>;

    /// Aggregate over all stored readings for `city`. `None` when there are none.
    fn daily_summary(&self, city: &str) -> Result<Option<DailySummary>, StoreError> {
        let history = self.history(city)?;
        Ok(DailySummary::from_readings(history.as_slice()))
    }
}

/// Run a store operation on the blocking thread pool.
pub async fn run_blocking<T, F>(store: &Arc<dyn ReadingStore>, op: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn ReadingStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| StoreError::Unavailable(format!("storage task failed: {e}")))?
}

/// A finished, newest-first sequence of readings for one city.
///
/// Materialized from a single query, so it can be walked any number of times
/// and never reflects inserts made after it was taken.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    readings: Vec<Reading>,
}

impl History {
    pub fn iter(&self) -> std::slice::Iter<'_, Reading> {
        self.readings.iter()
    }

    pub fn as_slice(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Reading;
    type IntoIter = std::slice::Iter<'a, Reading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.iter()
    }
}

impl From<Vec<Reading>> for History {
    fn from(readings: Vec<Reading>) -> Self {
        Self { readings }
    }
}

/// SQLite-backed reading store.
pub struct SqliteReadingStore {
    conn: Mutex<Connection>,
}

const READING_COLUMNS: &str = "city, weather, temp, feels_like, timestamp";

impl SqliteReadingStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("cannot open {}: {e}", path.display())))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(format!("cannot open in-memory database: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();

        // One connection serves every caller, so the default rollback
        // journal is enough.
        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;

            CREATE TABLE IF NOT EXISTS weather_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                city TEXT NOT NULL,
                weather TEXT NOT NULL,
                temp REAL NOT NULL,
                feels_like REAL NOT NULL,
                timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_weather_city_timestamp
                ON weather_data(city, timestamp);
            "#,
        )
        .map_err(RusqliteErrorExt::into_write_error)
    }

    fn row_to_reading(row: &rusqlite::Row) -> rusqlite::Result<Reading> {
        Ok(Reading {
            city: row.get(0)?,
            condition: row.get(1)?,
            temperature_c: row.get(2)?,
            feels_like_c: row.get(3)?,
            observed_at: row.get(4)?,
        })
    }

    /// Total number of stored readings.
    pub fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM weather_data", [], |row| row.get(0))
            .map_err(RusqliteErrorExt::into_read_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

impl ReadingStore for SqliteReadingStore {
    fn insert(&self, reading: &Reading) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO weather_data (city, weather, temp, feels_like, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                reading.city,
                reading.condition,
                reading.temperature_c,
                reading.feels_like_c,
                reading.observed_at,
            ],
        )
        .map_err(RusqliteErrorExt::into_write_error)?;

        let id = conn.last_insert_rowid();
        tracing::debug!(id, city = %reading.city, temp = reading.temperature_c, "Stored reading");
        Ok(id)
    }

    fn latest(&self, city: &str) -> Result<Option<Reading>, StoreError> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM weather_data
             WHERE city = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT 1"
        );
        self.conn
            .lock()
            .query_row(&sql, params![city], Self::row_to_reading)
            .optional()
            .map_err(RusqliteErrorExt::into_read_error)
    }

    fn history(&self, city: &str) -> Result<History, StoreError> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM weather_data
             WHERE city = ?1
             ORDER BY timestamp DESC, id DESC"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(RusqliteErrorExt::into_read_error)?;
        let readings = stmt
            .query_map(params![city], Self::row_to_reading)
            .map_err(RusqliteErrorExt::into_read_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(RusqliteErrorExt::into_read_error)?;
        Ok(History::from(readings))
    }

    fn latest_overall(&self) -> Result<Option<Reading>, StoreError> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM weather_data
             ORDER BY timestamp DESC, id DESC
             LIMIT 1"
        );
        self.conn
            .lock()
            .query_row(&sql, [], Self::row_to_reading)
            .optional()
            .map_err(RusqliteErrorExt::into_read_error)
    }
}

/// Vector-backed reading store.
#[derive(Default)]
pub struct InMemoryReadingStore {
    readings: RwLock<Vec<Reading>>,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.readings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.read().is_empty()
    }

    /// Newest first; among equal timestamps the later insert comes first.
    fn newest_first(readings: Vec<&Reading>) -> Vec<Reading> {
        let mut indexed: Vec<(usize, &Reading)> = readings.into_iter().enumerate().collect();
        indexed.sort_by(|(ia, a), (ib, b)| {
            b.observed_at.cmp(&a.observed_at).then_with(|| ib.cmp(ia))
        });
        indexed.into_iter().map(|(_, r)| r.clone()).collect()
    }
}

impl ReadingStore for InMemoryReadingStore {
    fn insert(&self, reading: &Reading) -> Result<i64, StoreError> {
        let mut readings = self.readings.write();
        readings.push(reading.clone());
        Ok(readings.len() as i64)
    }

    fn latest(&self, city: &str) -> Result<Option<Reading>, StoreError> {
        let readings = self.readings.read();
        let matching = readings.iter().filter(|r| r.city == city).collect();
        Ok(Self::newest_first(matching).into_iter().next())
    }

    fn history(&self, city: &str) -> Result<History, StoreError> {
        let readings = self.readings.read();
        let matching = readings.iter().filter(|r| r.city == city).collect();
        Ok(History::from(Self::newest_first(matching)))
    }

    fn latest_overall(&self) -> Result<Option<Reading>, StoreError> {
        let readings = self.readings.read();
        Ok(Self::newest_first(readings.iter().collect()).into_iter().next())
    }
}
