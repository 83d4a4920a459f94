//! Storage port: Trait for the persistent prediction log.
//!
//! This trait abstracts the storage backend (SQLite) from the application logic.

use crate::domain::{NewPrediction, PredictionRecord};

/// Startup state of a record store.
///
/// `Uninitialized -> (ensure_schema) -> TablePresent -> (migrate_if_legacy) -> Ready`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    TablePresent,
    Ready,
}

impl std::fmt::Display for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "UNINITIALIZED"),
            Self::TablePresent => write!(f, "TABLE_PRESENT"),
            Self::Ready => write!(f, "READY"),
        }
    }
}

/// Ordering of query results by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    /// Newest first
    #[default]
    Descending,
}

/// One window of the log, newest first, with the log size at query time.
///
/// Offsets saturate at `usize::MAX`, so any caller-supplied offset is safe.
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub items: Vec<PredictionRecord>,
    pub total_count: usize,
    pub offset: usize,
    pub limit: usize,
}

impl RecordPage {
    #[must_use]
    pub fn new(items: Vec<PredictionRecord>, total_count: usize, offset: usize, limit: usize) -> Self {
        Self {
            items,
            total_count,
            offset,
            limit,
        }
    }

    /// Records remain past this window.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.items.len()) < self.total_count
    }

    #[must_use]
    pub fn next_offset(&self) -> Option<usize> {
        self.has_more()
            .then(|| self.offset.saturating_add(self.limit.max(1)))
    }

    #[must_use]
    pub fn prev_offset(&self) -> Option<usize> {
        (self.offset > 0).then(|| self.offset.saturating_sub(self.limit))
    }
}

/// Append-only log of predictions.
///
/// Every operation other than the two startup steps requires the store to be
/// `Ready` and fails with a not-ready error otherwise.
pub trait RecordStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current startup state.
    fn state(&self) -> StoreState;

    /// Create the predictions table if absent. Idempotent.
    ///
    /// # Errors
    /// Returns error if the storage operation fails.
    fn ensure_schema(&self) -> Result<(), Self::Error>;

    /// Rebuild a legacy-shaped table under the current schema. Idempotent;
    /// a no-op when the table is already current.
    ///
    /// # Errors
    /// Returns error if called before `ensure_schema`, if the copy does not
    /// preserve every row, or if the storage operation fails. On error the
    /// original table is left intact.
    fn migrate_if_legacy(&self) -> Result<(), Self::Error>;

    /// Run both startup steps.
    ///
    /// # Errors
    /// Returns the first startup error.
    fn initialize(&self) -> Result<(), Self::Error> {
        self.ensure_schema()?;
        self.migrate_if_legacy()
    }

    /// Append a prediction and return the assigned id.
    ///
    /// # Errors
    /// Returns error if the store is not ready or the insert fails.
    fn append(&self, record: &NewPrediction) -> Result<i64, Self::Error>;

    /// Load every record ordered by id.
    ///
    /// An empty store yields an empty vector.
    ///
    /// # Errors
    /// Returns error if the store is not ready or the query fails.
    fn query_all(&self, order: SortOrder) -> Result<Vec<PredictionRecord>, Self::Error>;

    /// Load records with pagination, newest first.
    ///
    /// # Errors
    /// Returns error if the store is not ready or the query fails.
    fn query_page(&self, offset: usize, limit: usize) -> Result<RecordPage, Self::Error>;

    /// Get the total count of records.
    ///
    /// # Errors
    /// Returns error if the store is not ready or the query fails.
    fn count(&self) -> Result<usize, Self::Error>;

    /// Remove every record. Irreversible.
    ///
    /// # Errors
    /// Returns error if the store is not ready or the delete fails.
    fn delete_all(&self) -> Result<(), Self::Error>;
}
