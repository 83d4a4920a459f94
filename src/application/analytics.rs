//! Analytics: Descriptive statistics over stored predictions.
//!
//! `AnalyticsAggregator` is a set of pure functions over a record snapshot;
//! it never mutates its input. `AnalyticsService` takes the snapshot from a
//! store and assembles the dashboard summary.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::PredictionRecord;
use crate::ports::{RecordStore, SortOrder};
use crate::InsuranceError;

/// Categorical record fields usable for grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryField {
    Sex,
    Smoker,
    Region,
}

impl CategoryField {
    #[must_use]
    pub fn label(&self, record: &PredictionRecord) -> &'static str {
        match self {
            Self::Sex => record.sex.as_str(),
            Self::Smoker => record.smoker.as_str(),
            Self::Region => record.region.as_str(),
        }
    }
}

/// Numeric record fields usable as series axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    Id,
    Age,
    Bmi,
    Children,
    PredictedCost,
}

impl NumericField {
    #[must_use]
    pub fn value(&self, record: &PredictionRecord) -> f64 {
        match self {
            Self::Id => record.id as f64,
            Self::Age => f64::from(record.age),
            Self::Bmi => record.bmi,
            Self::Children => f64::from(record.children),
            Self::PredictedCost => record.predicted_cost,
        }
    }
}

/// Pure aggregations over a record snapshot.
pub struct AnalyticsAggregator;

impl AnalyticsAggregator {
    #[must_use]
    pub fn count(records: &[PredictionRecord]) -> usize {
        records.len()
    }

    /// Mean predicted cost; `None` for an empty snapshot.
    #[must_use]
    pub fn mean(records: &[PredictionRecord]) -> Option<f64> {
        if records.is_empty() {
            return None;
        }
        let total: f64 = records.iter().map(|r| r.predicted_cost).sum();
        Some(total / records.len() as f64)
    }

    /// Highest predicted cost; `None` for an empty snapshot.
    #[must_use]
    pub fn max(records: &[PredictionRecord]) -> Option<f64> {
        records
            .iter()
            .map(|r| r.predicted_cost)
            .reduce(f64::max)
    }

    /// Count of records per category value. Absent categories are omitted.
    #[must_use]
    pub fn group_by_category(
        records: &[PredictionRecord],
        field: CategoryField,
    ) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for record in records {
            *counts.entry(field.label(record)).or_insert(0) += 1;
        }
        counts
    }

    /// `(x, y)` pairs in snapshot order (not sorted by x).
    #[must_use]
    pub fn paired_series(
        records: &[PredictionRecord],
        x: NumericField,
        y: NumericField,
    ) -> Vec<(f64, f64)> {
        records.iter().map(|r| (x.value(r), y.value(r))).collect()
    }

    /// Everything the dashboard renders, from one snapshot.
    #[must_use]
    pub fn summarize(records: &[PredictionRecord]) -> DashboardSummary {
        DashboardSummary {
            count: Self::count(records),
            mean_cost: Self::mean(records),
            max_cost: Self::max(records),
            by_sex: Self::group_by_category(records, CategoryField::Sex),
            by_smoker: Self::group_by_category(records, CategoryField::Smoker),
            by_region: Self::group_by_category(records, CategoryField::Region),
            cost_trend: Self::paired_series(records, NumericField::Id, NumericField::PredictedCost),
            age_vs_cost: Self::paired_series(records, NumericField::Age, NumericField::PredictedCost),
            bmi_vs_cost: Self::paired_series(records, NumericField::Bmi, NumericField::PredictedCost),
        }
    }
}

/// Dashboard figures and chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub count: usize,
    pub mean_cost: Option<f64>,
    pub max_cost: Option<f64>,
    pub by_sex: BTreeMap<&'static str, usize>,
    pub by_smoker: BTreeMap<&'static str, usize>,
    pub by_region: BTreeMap<&'static str, usize>,
    /// Cost per record in insertion order (line chart)
    pub cost_trend: Vec<(f64, f64)>,
    /// Scatter series
    pub age_vs_cost: Vec<(f64, f64)>,
    pub bmi_vs_cost: Vec<(f64, f64)>,
}

/// Store-backed analytics.
pub struct AnalyticsService<S: RecordStore> {
    storage: Arc<S>,
}

impl<S> AnalyticsService<S>
where
    S: RecordStore,
    S::Error: Into<InsuranceError>,
{
    /// Create a new analytics service.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Snapshot of all records in insertion order.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn snapshot(&self) -> Result<Vec<PredictionRecord>, InsuranceError> {
        self.storage
            .query_all(SortOrder::Ascending)
            .map_err(Into::into)
    }

    /// Summary over the current contents of the store.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn summary(&self) -> Result<DashboardSummary, InsuranceError> {
        let records = self.snapshot()?;
        let summary = AnalyticsAggregator::summarize(&records);

        tracing::info!(
            "Generated dashboard summary: count={}, mean={:?}, max={:?}",
            summary.count,
            summary.mean_cost,
            summary.max_cost
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SqliteRecordStore;
    use crate::domain::{NewPrediction, PatientInput};

    fn record(id: i64, age: u32, sex: &str, smoker: &str, region: &str, cost: f64) -> PredictionRecord {
        let input = PatientInput::parse(age, sex, 27.5, 1, smoker, region).expect("Should parse");
        PredictionRecord::from_new(id, NewPrediction::new(&input, cost))
    }

    fn sample() -> Vec<PredictionRecord> {
        vec![
            record(1, 30, "male", "no", "southwest", 4000.0),
            record(2, 55, "female", "yes", "southeast", 36000.0),
            record(3, 19, "female", "no", "southwest", 2000.0),
        ]
    }

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(AnalyticsAggregator::count(&[]), 0);
        assert_eq!(AnalyticsAggregator::mean(&[]), None);
        assert_eq!(AnalyticsAggregator::max(&[]), None);
        assert!(AnalyticsAggregator::group_by_category(&[], CategoryField::Region).is_empty());
        assert!(AnalyticsAggregator::paired_series(&[], NumericField::Age, NumericField::PredictedCost)
            .is_empty());
    }

    #[test]
    fn test_statistics() {
        let records = sample();
        assert_eq!(AnalyticsAggregator::count(&records), 3);
        assert!((AnalyticsAggregator::mean(&records).expect("Should have mean") - 14000.0).abs() < 1e-9);
        assert_eq!(AnalyticsAggregator::max(&records), Some(36000.0));
    }

    #[test]
    fn test_group_by_category() {
        let records = sample();
        let by_sex = AnalyticsAggregator::group_by_category(&records, CategoryField::Sex);
        assert_eq!(by_sex.get("female"), Some(&2));
        assert_eq!(by_sex.get("male"), Some(&1));

        let by_region = AnalyticsAggregator::group_by_category(&records, CategoryField::Region);
        assert_eq!(by_region.len(), 2);
        assert_eq!(by_region.get("southwest"), Some(&2));
        assert_eq!(by_region.get("northeast"), None);
    }

    #[test]
    fn test_paired_series_keeps_snapshot_order() {
        let records = sample();
        let series =
            AnalyticsAggregator::paired_series(&records, NumericField::Age, NumericField::PredictedCost);
        assert_eq!(series, vec![(30.0, 4000.0), (55.0, 36000.0), (19.0, 2000.0)]);
    }

    #[test]
    fn test_aggregation_does_not_mutate_input() {
        let records = sample();
        let before = records.clone();
        let _ = AnalyticsAggregator::summarize(&records);
        assert_eq!(records, before);
    }

    #[test]
    fn test_service_summary_from_store() {
        let storage = Arc::new(SqliteRecordStore::in_memory().expect("Should create db"));
        let service = AnalyticsService::new(Arc::clone(&storage));

        let empty = service.summary().expect("Should summarize");
        assert_eq!(empty.count, 0);
        assert_eq!(empty.mean_cost, None);
        assert_eq!(empty.max_cost, None);

        for r in sample() {
            let new = NewPrediction::new(&r.input(), r.predicted_cost);
            storage.append(&new).expect("Should save");
        }

        let summary = service.summary().expect("Should summarize");
        assert_eq!(summary.count, 3);
        assert_eq!(summary.max_cost, Some(36000.0));
        assert_eq!(summary.by_smoker.get("yes"), Some(&1));
        assert_eq!(summary.cost_trend.len(), 3);
        assert!(summary.cost_trend[0].0 < summary.cost_trend[2].0);
    }
}
