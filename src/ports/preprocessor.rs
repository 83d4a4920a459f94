//! Preprocessor port: Trait for the feature stage in front of the model.
//!
//! Artifacts are trained against one specific feature layout. The stage that
//! produces that layout is selected together with the artifact, so callers
//! never pair a model with an encoding it was not trained on.

use crate::domain::PatientInput;

/// Turns a validated input into a model row.
pub trait Preprocessor: Send + Sync {
    /// Short identifier for logs (`ordinal`, `one_hot`).
    fn kind(&self) -> &'static str;

    /// Output column names, in row order.
    fn feature_names(&self) -> Vec<String>;

    /// Produce the model row for `input`.
    ///
    /// The returned vector has exactly `feature_names().len()` entries.
    fn transform(&self, input: &PatientInput) -> Vec<f64>;
}
