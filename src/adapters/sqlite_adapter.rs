//! SQLite bar store.

use crate::domain::error::PivotraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDateTime;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const STORED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> PivotraderError {
    PivotraderError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> PivotraderError {
    PivotraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_stored(raw: &str) -> Result<NaiveDateTime, PivotraderError> {
    NaiveDateTime::parse_from_str(raw, STORED_FORMAT).map_err(|e| PivotraderError::Database {
        reason: format!("bad stored timestamp '{}': {}", raw, e),
    })
}

impl SqliteAdapter {
    /// Open the file named by `[data] database`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PivotraderError> {
        let db_path = config
            .get_string("data", "database")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| PivotraderError::ConfigMissing {
                section: "data".into(),
                key: "database".into(),
            })?;
        let pool_size = config.get_int("data", "pool_size", 4).max(1) as u32;
        Self::open(db_path.trim(), pool_size)
    }

    pub fn open(path: &str, pool_size: u32) -> Result<Self, PivotraderError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, PivotraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PivotraderError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), PivotraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS bars (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_bars_timestamp ON bars(timestamp);",
            )
            .map_err(query_err)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_bars(&self) -> Result<Vec<OhlcvBar>, PivotraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, open, high, low, close, volume
                 FROM bars
                 ORDER BY timestamp ASC, id ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(query_err)?;

        let mut bars = Vec::new();
        for row in rows {
            let (ts, open, high, low, close, volume) = row.map_err(query_err)?;
            bars.push(OhlcvBar {
                timestamp: parse_stored(&ts)?,
                open,
                high,
                low,
                close,
                volume,
            });
        }
        Ok(bars)
    }

    fn replace_bars(&self, bars: &[OhlcvBar]) -> Result<usize, PivotraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        tx.execute("DELETE FROM bars", []).map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO bars (timestamp, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(query_err)?;
            for bar in bars {
                stmt.execute(params![
                    bar.timestamp.format(STORED_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;

        tracing::info!(bars = bars.len(), "bar table replaced");
        Ok(bars.len())
    }

    fn data_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, PivotraderError> {
        let result: (Option<String>, Option<String>, i64) = self
            .conn()?
            .query_row(
                "SELECT MIN(timestamp), MAX(timestamp), COUNT(*) FROM bars",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(first), Some(last), count) if count > 0 => Ok(Some((
                parse_stored(&first)?,
                parse_stored(&last)?,
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn bar(day: u32, hour: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        }
    }

    fn store() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig) {
            Err(PivotraderError::ConfigMissing { section, key }) => {
                assert_eq!(section, "data");
                assert_eq!(key, "database");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn fetch_returns_bars_in_time_order() {
        let adapter = store();
        let written = adapter
            .replace_bars(&[bar(2, 10, 101.0), bar(1, 10, 100.0), bar(1, 11, 100.5)])
            .unwrap();
        assert_eq!(written, 3);

        let fetched = adapter.fetch_bars().unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0], bar(1, 10, 100.0));
        assert_eq!(fetched[1].close, 100.5);
        assert_eq!(fetched[2].close, 101.0);
    }

    #[test]
    fn replace_clears_previous_rows() {
        let adapter = store();
        adapter.replace_bars(&[bar(1, 10, 100.0), bar(1, 11, 101.0)]).unwrap();
        adapter.replace_bars(&[bar(3, 9, 50.0)]).unwrap();

        let fetched = adapter.fetch_bars().unwrap();
        assert_eq!(fetched, vec![bar(3, 9, 50.0)]);
    }

    #[test]
    fn data_range_reports_bounds() {
        let adapter = store();
        adapter
            .replace_bars(&[bar(1, 10, 100.0), bar(5, 16, 102.0)])
            .unwrap();

        let (first, last, count) = adapter.data_range().unwrap().unwrap();
        assert_eq!(first, bar(1, 10, 0.0).timestamp);
        assert_eq!(last, bar(5, 16, 0.0).timestamp);
        assert_eq!(count, 2);
    }

    #[test]
    fn data_range_empty_table() {
        assert!(store().data_range().unwrap().is_none());
    }

    #[test]
    fn file_database_persists_between_opens() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bars.db");
        let path = path.to_str().unwrap();

        SqliteAdapter::open(path, 2)
            .unwrap()
            .replace_bars(&[bar(1, 10, 100.0)])
            .unwrap();
        let reopened = SqliteAdapter::open(path, 2).unwrap();
        assert_eq!(reopened.fetch_bars().unwrap().len(), 1);
    }
}
