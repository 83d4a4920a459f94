//! SQLite adapter: Implementation of RecordStore.
//!
//! Provides local persistence for prediction records in a single
//! `predictions` table.
//!
//! # Schema evolution
//!
//! Earlier releases stored a `username` column. `migrate_if_legacy` rebuilds
//! such a table under the current shape by copy, verify, drop, rename inside
//! one transaction. Any failure before commit rolls back, so the legacy table
//! is never dropped before the copy has been verified.
//!
//! # Mutex Behavior
//!
//! The connection and the startup state live behind one `Mutex`. Writes and
//! the migration are therefore serialized, and a reader can never observe a
//! half-applied migration. A poisoned mutex is reported as
//! `StoreError::LockPoisoned` instead of panicking.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection};

use crate::domain::{NewPrediction, PredictionRecord, Region, Sex, Smoker};
use crate::ports::{RecordPage, RecordStore, SortOrder, StoreState};

/// Table holding the prediction log.
pub const TABLE_NAME: &str = "predictions";

/// Current column layout, in table order.
pub const COLUMNS: [&str; 9] = [
    "id",
    "age",
    "sex",
    "bmi",
    "children",
    "smoker",
    "region",
    "predicted_cost",
    "date_time",
];

/// Column that marks a legacy-shaped table.
pub const LEGACY_COLUMN: &str = "username";

const STAGING_TABLE: &str = "predictions_migrating";

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store not ready for {operation}: state is {state}")]
    NotReady {
        operation: &'static str,
        state: StoreState,
    },

    #[error(
        "Migration aborted: legacy table has {legacy_rows} rows but the rebuilt table has {migrated_rows}"
    )]
    MigrationIntegrity {
        legacy_rows: usize,
        migrated_rows: usize,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

macro_rules! category_sql_impls {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

category_sql_impls!(Sex);
category_sql_impls!(Smoker);
category_sql_impls!(Region);

fn create_table_sql(table: &str) -> String {
    format!(
        r"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            age INTEGER,
            sex TEXT,
            bmi REAL,
            children INTEGER,
            smoker TEXT,
            region TEXT,
            predicted_cost REAL,
            date_time TEXT
        );
        "
    )
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PredictionRecord> {
    Ok(PredictionRecord {
        id: row.get(0)?,
        age: row.get(1)?,
        sex: row.get(2)?,
        bmi: row.get(3)?,
        children: row.get(4)?,
        smoker: row.get(5)?,
        region: row.get(6)?,
        predicted_cost: row.get(7)?,
        date_time: row.get(8)?,
    })
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn row_count(conn: &Connection, table: &str) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count as usize)
}

struct Inner {
    conn: Connection,
    state: StoreState,
}

/// SQLite record store.
pub struct SqliteRecordStore {
    inner: Mutex<Inner>,
}

impl SqliteRecordStore {
    /// Open the database at `path` and run both startup steps.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened, initialized or migrated.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let store = Self::open(path)?;
        store.initialize()?;
        Ok(store)
    }

    /// Create an initialized in-memory database (for testing).
    ///
    /// # Errors
    /// Returns error if the database cannot be created.
    pub fn in_memory() -> Result<Self, StoreError> {
        let store = Self::from_connection(Connection::open_in_memory()?);
        store.initialize()?;
        Ok(store)
    }

    /// Open the database at `path` without touching its schema.
    ///
    /// The store starts `Uninitialized`; call `initialize` (or the two
    /// startup steps) before any other operation.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection. The store starts `Uninitialized`.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Mutex::new(Inner {
                conn,
                state: StoreState::Uninitialized,
            }),
        }
    }

    /// Column names of the predictions table as currently stored.
    ///
    /// # Errors
    /// Returns error if the storage operation fails.
    pub fn table_columns(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.lock()?;
        Ok(table_columns(&inner.conn, TABLE_NAME)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn ready(&self, operation: &'static str) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let inner = self.lock()?;
        if inner.state != StoreState::Ready {
            return Err(StoreError::NotReady {
                operation,
                state: inner.state,
            });
        }
        Ok(inner)
    }

    /// Copy shared columns into a staging table, verify, then swap it in.
    fn rebuild_from_legacy(conn: &mut Connection, legacy_columns: &[String]) -> Result<usize, StoreError> {
        let shared: Vec<&str> = COLUMNS
            .iter()
            .copied()
            .filter(|c| legacy_columns.iter().any(|l| l == c))
            .collect();
        let column_list = shared.join(", ");

        let tx = conn.transaction()?;

        tx.execute_batch(&format!("DROP TABLE IF EXISTS {STAGING_TABLE};"))?;
        tx.execute_batch(&create_table_sql(STAGING_TABLE))?;
        // OR IGNORE: rows that cannot be carried over show up in the count check
        // below instead of as an opaque constraint error.
        tx.execute(
            &format!(
                "INSERT OR IGNORE INTO {STAGING_TABLE} ({column_list}) SELECT {column_list} FROM {TABLE_NAME}"
            ),
            [],
        )?;

        let legacy_rows = row_count(&tx, TABLE_NAME)?;
        let migrated_rows = row_count(&tx, STAGING_TABLE)?;
        if legacy_rows != migrated_rows {
            // Dropping `tx` rolls back; the legacy table is untouched.
            return Err(StoreError::MigrationIntegrity {
                legacy_rows,
                migrated_rows,
            });
        }

        tx.execute_batch(&format!(
            "DROP TABLE {TABLE_NAME}; ALTER TABLE {STAGING_TABLE} RENAME TO {TABLE_NAME};"
        ))?;
        tx.commit()?;

        Ok(migrated_rows)
    }
}

impl RecordStore for SqliteRecordStore {
    type Error = StoreError;

    fn state(&self) -> StoreState {
        // The state field is only written after each step succeeds, so it
        // stays accurate under a poisoned lock.
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    fn ensure_schema(&self) -> Result<(), Self::Error> {
        let mut inner = self.lock()?;
        inner.conn.execute_batch(&create_table_sql(TABLE_NAME))?;

        if inner.state == StoreState::Uninitialized {
            inner.state = StoreState::TablePresent;
        }
        tracing::debug!("Ensured {TABLE_NAME} table");
        Ok(())
    }

    fn migrate_if_legacy(&self) -> Result<(), Self::Error> {
        let mut inner = self.lock()?;
        if inner.state == StoreState::Uninitialized {
            return Err(StoreError::NotReady {
                operation: "migrate_if_legacy",
                state: inner.state,
            });
        }

        let columns = table_columns(&inner.conn, TABLE_NAME)?;
        if columns.iter().any(|c| c == LEGACY_COLUMN) {
            tracing::info!(
                "Legacy {TABLE_NAME} schema detected ({LEGACY_COLUMN} column), rebuilding table"
            );
            match Self::rebuild_from_legacy(&mut inner.conn, &columns) {
                Ok(rows) => tracing::info!("Migrated {rows} records to current schema"),
                Err(e) => {
                    tracing::error!("Schema migration aborted, legacy table kept: {e}");
                    return Err(e);
                }
            }
        }

        inner.state = StoreState::Ready;
        Ok(())
    }

    fn append(&self, record: &NewPrediction) -> Result<i64, Self::Error> {
        let inner = self.ready("append")?;

        inner.conn.execute(
            r"
            INSERT INTO predictions (
                age, sex, bmi, children, smoker, region, predicted_cost, date_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                record.age,
                record.sex,
                record.bmi,
                record.children,
                record.smoker,
                record.region,
                record.predicted_cost,
                record.date_time,
            ],
        )?;
        let id = inner.conn.last_insert_rowid();

        tracing::debug!("Saved prediction {id} to storage");
        Ok(id)
    }

    fn query_all(&self, order: SortOrder) -> Result<Vec<PredictionRecord>, Self::Error> {
        let inner = self.ready("query_all")?;

        let direction = match order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let mut stmt = inner.conn.prepare(&format!(
            r"
            SELECT id, age, sex, bmi, children, smoker, region, predicted_cost, date_time
            FROM predictions
            ORDER BY id {direction}
            "
        ))?;

        let records = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn query_page(&self, offset: usize, limit: usize) -> Result<RecordPage, Self::Error> {
        let inner = self.ready("query_page")?;

        let total_count = row_count(&inner.conn, TABLE_NAME)?;

        let mut stmt = inner.conn.prepare(
            r"
            SELECT id, age, sex, bmi, children, smoker, region, predicted_cost, date_time
            FROM predictions
            ORDER BY id DESC
            LIMIT ?1 OFFSET ?2
            ",
        )?;

        // SQLite reads a negative LIMIT or OFFSET as "none"; clamp instead of wrapping.
        let sql_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql_offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![sql_limit, sql_offset], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecordPage::new(records, total_count, offset, limit))
    }

    fn count(&self) -> Result<usize, Self::Error> {
        let inner = self.ready("count")?;
        Ok(row_count(&inner.conn, TABLE_NAME)?)
    }

    fn delete_all(&self) -> Result<(), Self::Error> {
        let inner = self.ready("delete_all")?;
        let removed = inner.conn.execute("DELETE FROM predictions", [])?;
        tracing::warn!("Cleared all {removed} predictions from storage");
        Ok(())
    }
}
