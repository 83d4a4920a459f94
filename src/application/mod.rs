//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

mod analytics;
mod prediction;

pub use analytics::{
    AnalyticsAggregator, AnalyticsService, CategoryField, DashboardSummary, NumericField,
};
pub use prediction::{Estimate, Persistence, PredictionOutcome, PredictionPipeline, PredictionService};
