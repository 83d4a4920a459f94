//! # insurance-cost
//!
//! Medical insurance cost estimation with a local prediction log.
//!
//! This crate provides:
//! - Fixed categorical feature encoding (plus a pluggable one-hot stage)
//! - Inference against a pre-trained linear regression artifact
//! - A SQLite prediction log with forward schema migration
//! - Descriptive analytics and CSV export over the stored records
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (PatientInput, encoding, PredictionRecord)
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (JSON artifacts, SQLite, CSV)
//! - `application`: Use cases orchestrating domain and ports
//! - `cli`: Command-line front end

pub mod adapters;
pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod ports;

pub use domain::{NewPrediction, PatientInput, PredictionRecord, Region, Sex, Smoker};

use adapters::{ModelLoadError, StoreError};
use domain::InvalidCategoryError;
use ports::{InferenceError, StoreState};

/// Result type for insurance-cost operations
pub type Result<T> = std::result::Result<T, InsuranceError>;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum InsuranceError {
    #[error(transparent)]
    InvalidCategory(#[from] InvalidCategoryError),

    #[error("Invalid patient data: {0}")]
    Validation(String),

    #[error("Model load failed: {0}")]
    ModelLoad(#[from] ModelLoadError),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Store not ready for {operation} (state {state})")]
    StoreNotReady {
        operation: &'static str,
        state: StoreState,
    },

    #[error("Schema migration integrity failure: legacy table has {legacy_rows} rows, copy has {migrated_rows}")]
    MigrationIntegrity {
        legacy_rows: usize,
        migrated_rows: usize,
    },

    #[error("Storage operation failed: {0}")]
    Storage(StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for InsuranceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotReady { operation, state } => Self::StoreNotReady { operation, state },
            StoreError::MigrationIntegrity {
                legacy_rows,
                migrated_rows,
            } => Self::MigrationIntegrity {
                legacy_rows,
                migrated_rows,
            },
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_route_to_dedicated_variants() {
        let not_ready: InsuranceError = StoreError::NotReady {
            operation: "append",
            state: StoreState::TablePresent,
        }
        .into();
        assert!(matches!(not_ready, InsuranceError::StoreNotReady { operation: "append", .. }));

        let integrity: InsuranceError = StoreError::MigrationIntegrity {
            legacy_rows: 3,
            migrated_rows: 2,
        }
        .into();
        assert!(matches!(
            integrity,
            InsuranceError::MigrationIntegrity { legacy_rows: 3, migrated_rows: 2 }
        ));

        let poisoned: InsuranceError = StoreError::LockPoisoned.into();
        assert!(matches!(poisoned, InsuranceError::Storage(StoreError::LockPoisoned)));
    }
}
