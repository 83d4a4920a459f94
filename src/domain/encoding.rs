//! Fixed categorical encoding used by the ordinal-trained models.
//!
//! | field  | mapping                                                     |
//! |--------|-------------------------------------------------------------|
//! | sex    | female = 0, male = 1                                        |
//! | smoker | no = 0, yes = 1                                             |
//! | region | southwest = 0, southeast = 1, northwest = 2, northeast = 3  |
//!
//! Numeric fields pass through untouched. No scaling is applied here.

use serde::{Deserialize, Serialize};

use super::patient::{PatientInput, Region, Sex, Smoker};

/// Feature names in model column order.
pub const ORDINAL_FEATURE_NAMES: [&str; 6] = ["age", "sex", "bmi", "children", "smoker", "region"];

/// Encoded model input for a single request. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodedFeatureVector {
    pub age: u32,
    pub sex: u8,
    pub bmi: f64,
    pub children: u32,
    pub smoker: u8,
    pub region: u8,
}

impl EncodedFeatureVector {
    /// Convert to a row for inference, in `ORDINAL_FEATURE_NAMES` order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            f64::from(self.age),
            f64::from(self.sex),
            self.bmi,
            f64::from(self.children),
            f64::from(self.smoker),
            f64::from(self.region),
        ]
    }
}

/// Stateless lookup-table encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    /// Encode a typed input. Total: every `PatientInput` has an encoding.
    #[must_use]
    pub fn encode(input: &PatientInput) -> EncodedFeatureVector {
        EncodedFeatureVector {
            age: input.age,
            sex: Self::sex_code(input.sex),
            bmi: input.bmi,
            children: input.children,
            smoker: Self::smoker_code(input.smoker),
            region: Self::region_code(input.region),
        }
    }

    #[must_use]
    pub fn sex_code(sex: Sex) -> u8 {
        match sex {
            Sex::Female => 0,
            Sex::Male => 1,
        }
    }

    #[must_use]
    pub fn smoker_code(smoker: Smoker) -> u8 {
        match smoker {
            Smoker::No => 0,
            Smoker::Yes => 1,
        }
    }

    #[must_use]
    pub fn region_code(region: Region) -> u8 {
        match region {
            Region::Southwest => 0,
            Region::Southeast => 1,
            Region::Northwest => 2,
            Region::Northeast => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_scenario_encoding() {
        let input = PatientInput::parse(25, "male", 25.0, 0, "no", "southwest")
            .expect("Should parse");
        let encoded = FeatureEncoder::encode(&input);

        assert_eq!(
            encoded,
            EncodedFeatureVector {
                age: 25,
                sex: 1,
                bmi: 25.0,
                children: 0,
                smoker: 0,
                region: 0,
            }
        );
        assert_eq!(encoded.to_vec(), vec![25.0, 1.0, 25.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_category_codes() {
        assert_eq!(FeatureEncoder::sex_code(Sex::Male), 1);
        assert_eq!(FeatureEncoder::sex_code(Sex::Female), 0);
        assert_eq!(FeatureEncoder::smoker_code(Smoker::Yes), 1);
        assert_eq!(FeatureEncoder::smoker_code(Smoker::No), 0);
        let codes: Vec<u8> = Region::ALL
            .into_iter()
            .map(FeatureEncoder::region_code)
            .collect();
        assert_eq!(codes, vec![0, 1, 2, 3]);
    }

    fn any_input() -> impl Strategy<Value = PatientInput> {
        (
            18u32..=100,
            prop::sample::select(Sex::ALL.to_vec()),
            10.0f64..=60.0,
            0u32..=5,
            prop::sample::select(Smoker::ALL.to_vec()),
            prop::sample::select(Region::ALL.to_vec()),
        )
            .prop_map(|(age, sex, bmi, children, smoker, region)| PatientInput {
                age,
                sex,
                bmi,
                children,
                smoker,
                region,
            })
    }

    proptest! {
        #[test]
        fn encode_is_deterministic(input in any_input()) {
            prop_assert_eq!(FeatureEncoder::encode(&input), FeatureEncoder::encode(&input));
        }

        #[test]
        fn encode_passes_numeric_fields_through(input in any_input()) {
            let encoded = FeatureEncoder::encode(&input);
            prop_assert_eq!(encoded.age, input.age);
            prop_assert_eq!(encoded.bmi.to_bits(), input.bmi.to_bits());
            prop_assert_eq!(encoded.children, input.children);
            prop_assert_eq!(encoded.sex, u8::from(input.sex == Sex::Male));
        }
    }
}
