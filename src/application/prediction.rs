//! Prediction services: Orchestrates cost estimation.
//!
//! This module coordinates:
//! - Input validation
//! - Feature preprocessing
//! - Model inference
//! - Rounding for display
//! - Storage persistence (display first, persist second)

use std::sync::Arc;

use serde::Serialize;

use crate::adapters::{LinearRegressor, ModelBundle};
use crate::domain::{
    format_cost, round_cost, EncodedFeatureVector, NewPrediction, PatientInput, PredictionRecord,
};
use crate::ports::{Preprocessor, RecordPage, RecordStore, Regressor, SortOrder, StoreState};
use crate::InsuranceError;

/// Read-only inference over a loaded artifact.
pub struct PredictionService<R: Regressor> {
    regressor: Arc<R>,
}

impl<R: Regressor> Clone for PredictionService<R> {
    fn clone(&self) -> Self {
        Self {
            regressor: Arc::clone(&self.regressor),
        }
    }
}

impl<R: Regressor> PredictionService<R> {
    /// Create a new prediction service.
    pub fn new(regressor: Arc<R>) -> Self {
        Self { regressor }
    }

    /// Number of columns the artifact expects.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.regressor.n_features()
    }

    /// Estimate a cost for one model row.
    ///
    /// # Errors
    /// Returns `InsuranceError::Inference` if the artifact rejects the row.
    pub fn predict(&self, row: &[f64]) -> Result<f64, InsuranceError> {
        self.regressor.predict(row).map_err(|e| {
            tracing::error!("Inference rejected feature row: {e}");
            InsuranceError::Inference(e)
        })
    }

    /// Estimate a cost for an ordinal-encoded vector.
    ///
    /// # Errors
    /// Returns `InsuranceError::Inference` if the artifact rejects the vector.
    pub fn predict_encoded(&self, vector: &EncodedFeatureVector) -> Result<f64, InsuranceError> {
        self.predict(&vector.to_vec())
    }
}

/// A displayed estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    pub input: PatientInput,
    /// Rounded to 2 decimals; this exact value is what gets stored
    pub predicted_cost: f64,
}

impl Estimate {
    /// Cost formatted for display (`3,200.00`).
    #[must_use]
    pub fn display_cost(&self) -> String {
        format_cost(self.predicted_cost)
    }
}

/// Outcome of the persistence step after an estimate was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Persistence {
    Saved(PredictionRecord),
    /// Not saved; the estimate is still valid
    Failed(String),
    /// Pipeline has no store attached
    Skipped,
}

/// Estimate plus what happened when it was persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    pub estimate: Estimate,
    pub persistence: Persistence,
}

/// End-to-end pipeline: validate, preprocess, predict, round, persist.
///
/// A pipeline built without a store only estimates.
pub struct PredictionPipeline<R, S>
where
    R: Regressor,
    S: RecordStore,
{
    preprocessor: Box<dyn Preprocessor>,
    predictor: PredictionService<R>,
    store: Option<Arc<S>>,
}

impl<S> PredictionPipeline<LinearRegressor, S>
where
    S: RecordStore,
    S::Error: Into<InsuranceError>,
{
    /// Build a pipeline from a loaded artifact bundle.
    pub fn from_bundle(bundle: ModelBundle, store: Option<Arc<S>>) -> Self {
        Self {
            preprocessor: bundle.preprocessor,
            predictor: PredictionService::new(Arc::new(bundle.regressor)),
            store,
        }
    }
}

impl<R, S> PredictionPipeline<R, S>
where
    R: Regressor,
    S: RecordStore,
    S::Error: Into<InsuranceError>,
{
    /// Create a new pipeline.
    pub fn new(preprocessor: Box<dyn Preprocessor>, regressor: Arc<R>, store: Arc<S>) -> Self {
        Self {
            preprocessor,
            predictor: PredictionService::new(regressor),
            store: Some(store),
        }
    }

    /// Create a pipeline that never persists.
    pub fn estimate_only(preprocessor: Box<dyn Preprocessor>, regressor: Arc<R>) -> Self {
        Self {
            preprocessor,
            predictor: PredictionService::new(regressor),
            store: None,
        }
    }

    /// Shared handle to the underlying store, if any.
    #[must_use]
    pub fn store(&self) -> Option<&Arc<S>> {
        self.store.as_ref()
    }

    fn attached(&self, operation: &'static str) -> Result<&Arc<S>, InsuranceError> {
        self.store.as_ref().ok_or(InsuranceError::StoreNotReady {
            operation,
            state: StoreState::Uninitialized,
        })
    }

    /// Produce a rounded estimate without touching storage.
    ///
    /// # Errors
    /// Returns `InsuranceError::Validation` for out-of-range fields and
    /// `InsuranceError::Inference` if the artifact rejects the row.
    pub fn estimate(&self, input: &PatientInput) -> Result<Estimate, InsuranceError> {
        input
            .validate()
            .map_err(|errors| InsuranceError::Validation(errors.join("; ")))?;

        tracing::debug!("Estimating cost for {:?}", input);
        let row = self.preprocessor.transform(input);
        let raw = self.predictor.predict(&row)?;

        let estimate = Estimate {
            input: *input,
            predicted_cost: round_cost(raw),
        };
        tracing::info!(
            "Estimate complete: preprocessing={}, cost={}",
            self.preprocessor.kind(),
            estimate.display_cost()
        );
        Ok(estimate)
    }

    /// Persist an estimate exactly as displayed.
    ///
    /// # Errors
    /// Returns error if the store is not ready or the insert fails.
    pub fn record(&self, estimate: &Estimate) -> Result<PredictionRecord, InsuranceError> {
        let new = NewPrediction::new(&estimate.input, estimate.predicted_cost);
        let id = self
            .attached("append")?
            .append(&new)
            .map_err(Into::<InsuranceError>::into)?;
        Ok(PredictionRecord::from_new(id, new))
    }

    /// Estimate, then try to persist.
    ///
    /// A persistence failure is logged and reported in the outcome; it never
    /// discards the estimate. Without a store the outcome is `Skipped`.
    ///
    /// # Errors
    /// Returns error only if the estimate itself fails.
    pub fn estimate_and_record(&self, input: &PatientInput) -> Result<PredictionOutcome, InsuranceError> {
        let estimate = self.estimate(input)?;
        if self.store.is_none() {
            return Ok(PredictionOutcome {
                estimate,
                persistence: Persistence::Skipped,
            });
        }

        let persistence = match self.record(&estimate) {
            Ok(record) => Persistence::Saved(record),
            Err(e) => {
                tracing::warn!("Failed to save prediction: {e}");
                Persistence::Failed(e.to_string())
            }
        };

        Ok(PredictionOutcome {
            estimate,
            persistence,
        })
    }

    /// All stored predictions.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn history(&self, order: SortOrder) -> Result<Vec<PredictionRecord>, InsuranceError> {
        self.attached("query_all")?
            .query_all(order)
            .map_err(Into::into)
    }

    /// One page of stored predictions, newest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn history_page(&self, offset: usize, limit: usize) -> Result<RecordPage, InsuranceError> {
        self.attached("query_page")?
            .query_page(offset, limit)
            .map_err(Into::into)
    }

    /// Delete every stored prediction.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn clear_history(&self) -> Result<(), InsuranceError> {
        self.attached("delete_all")?
            .delete_all()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{OneHotPreprocessor, OrdinalPreprocessor, SqliteRecordStore};
    use crate::domain::{FeatureEncoder, TIMESTAMP_FORMAT};
    use crate::ports::InferenceError;
    use rusqlite::Connection;

    /// Stub artifact returning a fixed value for correctly shaped rows.
    struct FixedRegressor {
        n_features: usize,
        value: f64,
    }

    impl Regressor for FixedRegressor {
        fn n_features(&self) -> usize {
            self.n_features
        }

        fn predict(&self, row: &[f64]) -> Result<f64, InferenceError> {
            if row.len() != self.n_features {
                return Err(InferenceError::FeatureCountMismatch {
                    expected: self.n_features,
                    got: row.len(),
                });
            }
            Ok(self.value)
        }
    }

    fn scenario_input() -> PatientInput {
        PatientInput::parse(25, "male", 25.0, 0, "no", "southwest").expect("Should parse")
    }

    fn create_test_pipeline(value: f64) -> PredictionPipeline<FixedRegressor, SqliteRecordStore> {
        let storage = Arc::new(SqliteRecordStore::in_memory().expect("Should create db"));
        PredictionPipeline::new(
            Box::new(OrdinalPreprocessor),
            Arc::new(FixedRegressor {
                n_features: 6,
                value,
            }),
            storage,
        )
    }

    #[test]
    fn test_reference_scenario() {
        let vector = FeatureEncoder::encode(&scenario_input());
        assert_eq!(vector.to_vec(), vec![25.0, 1.0, 25.0, 0.0, 0.0, 0.0]);

        let pipeline = create_test_pipeline(3200.0);
        let outcome = pipeline
            .estimate_and_record(&scenario_input())
            .expect("Should estimate");

        assert!((outcome.estimate.predicted_cost - 3200.0).abs() < f64::EPSILON);
        assert_eq!(outcome.estimate.display_cost(), "3,200.00");

        let Persistence::Saved(saved) = outcome.persistence else {
            panic!("Should be saved");
        };
        let history = pipeline.history(SortOrder::Descending).expect("Should load");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], saved);
        assert!((history[0].predicted_cost - 3200.00).abs() < f64::EPSILON);
        chrono::NaiveDateTime::parse_from_str(&history[0].date_time, TIMESTAMP_FORMAT)
            .expect("Should match timestamp format");
    }

    #[test]
    fn test_stored_value_equals_displayed_value() {
        let pipeline = create_test_pipeline(12345.6789);
        let outcome = pipeline
            .estimate_and_record(&scenario_input())
            .expect("Should estimate");
        assert_eq!(outcome.estimate.display_cost(), "12,345.68");

        let history = pipeline.history(SortOrder::Descending).expect("Should load");
        assert!((history[0].predicted_cost - outcome.estimate.predicted_cost).abs() < f64::EPSILON);
        assert!((history[0].predicted_cost - 12345.68).abs() < 1e-9);
    }

    #[test]
    fn test_persistence_failure_keeps_estimate() {
        let unready = Arc::new(SqliteRecordStore::from_connection(
            Connection::open_in_memory().expect("Should create db"),
        ));
        let pipeline = PredictionPipeline::new(
            Box::new(OrdinalPreprocessor),
            Arc::new(FixedRegressor {
                n_features: 6,
                value: 5000.0,
            }),
            unready,
        );

        let outcome = pipeline
            .estimate_and_record(&scenario_input())
            .expect("Estimate should still succeed");
        assert!((outcome.estimate.predicted_cost - 5000.0).abs() < f64::EPSILON);
        assert!(matches!(outcome.persistence, Persistence::Failed(_)));
    }

    #[test]
    fn test_shape_mismatch_is_surfaced() {
        let storage = Arc::new(SqliteRecordStore::in_memory().expect("Should create db"));
        let pipeline = PredictionPipeline::new(
            Box::new(OneHotPreprocessor::default()),
            Arc::new(FixedRegressor {
                n_features: 6,
                value: 1.0,
            }),
            Arc::clone(&storage),
        );

        let err = pipeline
            .estimate_and_record(&scenario_input())
            .expect_err("Should fail");
        assert!(matches!(
            err,
            InsuranceError::Inference(InferenceError::FeatureCountMismatch { expected: 6, got: 11 })
        ));
        assert_eq!(storage.count().expect("Should count"), 0);
    }

    #[test]
    fn test_invalid_input_rejected_before_inference() {
        let pipeline = create_test_pipeline(1.0);
        let input = PatientInput {
            age: 12,
            ..scenario_input()
        };
        assert!(matches!(
            pipeline.estimate(&input),
            Err(InsuranceError::Validation(_))
        ));
    }

    #[test]
    fn test_clear_history() {
        let pipeline = create_test_pipeline(100.0);
        pipeline
            .estimate_and_record(&scenario_input())
            .expect("Should estimate");
        pipeline.clear_history().expect("Should clear");
        assert!(pipeline.history(SortOrder::Descending).expect("Should load").is_empty());
        assert_eq!(pipeline.history_page(0, 10).expect("Should page").total_count, 0);
    }

    #[test]
    fn test_estimate_only_pipeline_skips_persistence() {
        let pipeline: PredictionPipeline<_, SqliteRecordStore> = PredictionPipeline::estimate_only(
            Box::new(OrdinalPreprocessor),
            Arc::new(FixedRegressor {
                n_features: 6,
                value: 3200.0,
            }),
        );
        assert!(pipeline.store().is_none());

        let outcome = pipeline
            .estimate_and_record(&scenario_input())
            .expect("Should estimate");
        assert_eq!(outcome.estimate.display_cost(), "3,200.00");
        assert_eq!(outcome.persistence, Persistence::Skipped);

        assert!(matches!(
            pipeline.history(SortOrder::Descending),
            Err(InsuranceError::StoreNotReady { operation: "query_all", .. })
        ));
    }

    #[test]
    fn test_predict_encoded() {
        let service = PredictionService::new(Arc::new(LinearRegressor::new(
            vec![100.0, 0.0, 10.0, 0.0, 20000.0, 0.0],
            -1000.0,
        )));
        assert_eq!(service.n_features(), 6);
        let cost = service
            .predict_encoded(&FeatureEncoder::encode(&scenario_input()))
            .expect("Should predict");
        assert!((cost - 1750.0).abs() < 1e-9);
    }
}
