//! Regressor port: Trait for an opaque pre-trained regression artifact.

/// Errors raised by a regressor at prediction time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("Feature count mismatch: got {got}, model expects {expected}")]
    FeatureCountMismatch { expected: usize, got: usize },

    #[error("Non-finite feature value at column {index}")]
    NonFiniteFeature { index: usize },

    #[error("Model produced a non-finite estimate: {0}")]
    NonFiniteOutput(f64),
}

/// A loaded, read-only regression model.
///
/// Implementations hold no mutable state; `predict` may be called
/// repeatedly and from several threads.
pub trait Regressor: Send + Sync {
    /// Number of input columns the model was trained on.
    fn n_features(&self) -> usize;

    /// Estimate a single value for one row.
    ///
    /// # Errors
    /// Returns `InferenceError` if the row does not match the trained shape
    /// or the estimate is not a finite number.
    fn predict(&self, row: &[f64]) -> Result<f64, InferenceError>;
}
