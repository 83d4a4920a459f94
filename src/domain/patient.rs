//! Patient input types for insurance cost estimation.
//!
//! Six attributes collected from the form: age, sex, BMI, number of children,
//! smoking status and residential region.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A categorical label that is not part of its field's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} category: {value:?}")]
pub struct InvalidCategoryError {
    /// Name of the categorical field (`sex`, `smoker`, `region`)
    pub field: &'static str,
    /// The rejected raw value
    pub value: String,
}

impl InvalidCategoryError {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

/// Biological sex as recorded in the training data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
}

/// Smoking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Smoker {
    No,
    Yes,
}

/// US residential region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Southwest,
    Southeast,
    Northwest,
    Northeast,
}

impl Sex {
    /// All labels in vocabulary order.
    pub const ALL: [Self; 2] = [Self::Female, Self::Male];

    /// Stored / display label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
        }
    }
}

impl Smoker {
    /// All labels in vocabulary order.
    pub const ALL: [Self; 2] = [Self::No, Self::Yes];

    /// Stored / display label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Yes => "yes",
        }
    }
}

impl Region {
    /// All labels in vocabulary order.
    pub const ALL: [Self; 4] = [
        Self::Southwest,
        Self::Southeast,
        Self::Northwest,
        Self::Northeast,
    ];

    /// Stored / display label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Southwest => "southwest",
            Self::Southeast => "southeast",
            Self::Northwest => "northwest",
            Self::Northeast => "northeast",
        }
    }
}

macro_rules! category_str_impls {
    ($ty:ty, $field:literal) => {
        impl FromStr for $ty {
            type Err = InvalidCategoryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase();
                Self::ALL
                    .into_iter()
                    .find(|c| c.as_str() == normalized)
                    .ok_or_else(|| InvalidCategoryError::new($field, s))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

category_str_impls!(Sex, "sex");
category_str_impls!(Smoker, "smoker");
category_str_impls!(Region, "region");

/// Inclusive bounds accepted by the input form.
pub const AGE_RANGE: std::ops::RangeInclusive<u32> = 18..=100;
/// BMI bounds.
pub const BMI_RANGE: std::ops::RangeInclusive<f64> = 10.0..=60.0;
/// Number of children bounds.
pub const CHILDREN_RANGE: std::ops::RangeInclusive<u32> = 0..=5;

/// One submission of the input form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatientInput {
    /// Age in years (18-100)
    pub age: u32,
    pub sex: Sex,
    /// Body mass index (10.0-60.0)
    pub bmi: f64,
    /// Number of dependent children (0-5)
    pub children: u32,
    pub smoker: Smoker,
    pub region: Region,
}

impl PatientInput {
    /// Parse raw form values into a typed input.
    ///
    /// Category labels are matched case-insensitively after trimming.
    ///
    /// # Errors
    /// Returns `InvalidCategoryError` for the first categorical value outside
    /// its vocabulary.
    pub fn parse(
        age: u32,
        sex: &str,
        bmi: f64,
        children: u32,
        smoker: &str,
        region: &str,
    ) -> Result<Self, InvalidCategoryError> {
        Ok(Self {
            age,
            sex: sex.parse()?,
            bmi,
            children,
            smoker: smoker.parse()?,
            region: region.parse()?,
        })
    }

    /// Validate numeric fields against the form's declared ranges.
    ///
    /// # Errors
    /// Returns every violation found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !AGE_RANGE.contains(&self.age) {
            errors.push(format!(
                "Age {} out of range [{}, {}]",
                self.age,
                AGE_RANGE.start(),
                AGE_RANGE.end()
            ));
        }
        if !self.bmi.is_finite() || !BMI_RANGE.contains(&self.bmi) {
            errors.push(format!(
                "BMI {} out of range [{}, {}]",
                self.bmi,
                BMI_RANGE.start(),
                BMI_RANGE.end()
            ));
        }
        if !CHILDREN_RANGE.contains(&self.children) {
            errors.push(format!(
                "Children {} out of range [{}, {}]",
                self.children,
                CHILDREN_RANGE.start(),
                CHILDREN_RANGE.end()
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PatientInput {
        PatientInput {
            age: 25,
            sex: Sex::Male,
            bmi: 25.0,
            children: 0,
            smoker: Smoker::No,
            region: Region::Southwest,
        }
    }

    #[test]
    fn test_parse_accepts_known_labels() {
        let input = PatientInput::parse(40, "Female", 31.2, 2, " yes ", "NORTHEAST")
            .expect("Should parse");
        assert_eq!(input.sex, Sex::Female);
        assert_eq!(input.smoker, Smoker::Yes);
        assert_eq!(input.region, Region::Northeast);
    }

    #[test]
    fn test_parse_rejects_unknown_region() {
        let err = PatientInput::parse(40, "male", 31.2, 2, "no", "midwest")
            .expect_err("Should reject");
        assert_eq!(err.field, "region");
        assert_eq!(err.value, "midwest");
    }

    #[test]
    fn test_parse_rejects_unknown_smoker() {
        let err = "sometimes".parse::<Smoker>().expect_err("Should reject");
        assert_eq!(err.field, "smoker");
    }

    #[test]
    fn test_labels_roundtrip_through_display() {
        for region in Region::ALL {
            assert_eq!(region.to_string().parse::<Region>(), Ok(region));
        }
    }

    #[test]
    fn test_validation() {
        assert!(sample().validate().is_ok());

        let invalid = PatientInput {
            age: 10,
            bmi: 75.0,
            children: 6,
            ..sample()
        };
        let errors = invalid.validate().expect_err("Should fail");
        assert_eq!(errors.len(), 3);

        let nan_bmi = PatientInput {
            bmi: f64::NAN,
            ..sample()
        };
        assert!(nan_bmi.validate().is_err());
    }
}
