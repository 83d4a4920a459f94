//! Prediction record types.
//!
//! A record pairs the submitted attributes with the estimated cost the user
//! was shown. The rounded cost is the single source of truth: what is stored
//! is exactly what was displayed.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

use super::patient::{PatientInput, Region, Sex, Smoker};

/// Timestamp layout of the `date_time` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Round a model output to cents.
#[must_use]
pub fn round_cost(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Render a cost with thousands separators and two decimals (`12,345.68`).
#[must_use]
pub fn format_cost(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

/// Format a timestamp for the `date_time` column.
#[must_use]
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// A prediction ready to be appended (no id assigned yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    pub age: u32,
    pub sex: Sex,
    pub bmi: f64,
    pub children: u32,
    pub smoker: Smoker,
    pub region: Region,
    /// Estimated cost, rounded to 2 decimals
    pub predicted_cost: f64,
    /// Local wall-clock time, `YYYY-MM-DD HH:MM:SS`
    pub date_time: String,
}

impl NewPrediction {
    /// Build a record for `input`, rounding the cost and stamping local time.
    #[must_use]
    pub fn new(input: &PatientInput, predicted_cost: f64) -> Self {
        Self::at(input, predicted_cost, &Local::now())
    }

    /// Build a record with an explicit timestamp.
    #[must_use]
    pub fn at<Tz: TimeZone>(input: &PatientInput, predicted_cost: f64, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            age: input.age,
            sex: input.sex,
            bmi: input.bmi,
            children: input.children,
            smoker: input.smoker,
            region: input.region,
            predicted_cost: round_cost(predicted_cost),
            date_time: format_timestamp(at),
        }
    }
}

/// A persisted prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Auto-incrementing surrogate key
    pub id: i64,
    pub age: u32,
    pub sex: Sex,
    pub bmi: f64,
    pub children: u32,
    pub smoker: Smoker,
    pub region: Region,
    pub predicted_cost: f64,
    pub date_time: String,
}

impl PredictionRecord {
    /// Attach a store-assigned id to a new prediction.
    #[must_use]
    pub fn from_new(id: i64, new: NewPrediction) -> Self {
        Self {
            id,
            age: new.age,
            sex: new.sex,
            bmi: new.bmi,
            children: new.children,
            smoker: new.smoker,
            region: new.region,
            predicted_cost: new.predicted_cost,
            date_time: new.date_time,
        }
    }

    /// Recover the submitted attributes.
    #[must_use]
    pub fn input(&self) -> PatientInput {
        PatientInput {
            age: self.age,
            sex: self.sex,
            bmi: self.bmi,
            children: self.children,
            smoker: self.smoker,
            region: self.region,
        }
    }
}
