//! Domain layer: Core business types and logic.
//!
//! Pure Rust types with no I/O. Categorical inputs are parsed into enums at
//! the boundary so everything downstream works with valid values only.

mod encoding;
mod patient;
mod prediction;

pub use encoding::{EncodedFeatureVector, FeatureEncoder, ORDINAL_FEATURE_NAMES};
pub use patient::{
    InvalidCategoryError, PatientInput, Region, Sex, Smoker, AGE_RANGE, BMI_RANGE, CHILDREN_RANGE,
};
pub use prediction::{
    format_cost, format_timestamp, round_cost, NewPrediction, PredictionRecord, TIMESTAMP_FORMAT,
};
