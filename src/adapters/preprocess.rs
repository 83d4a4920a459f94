//! Feature stage implementations.
//!
//! - `OrdinalPreprocessor`: the fixed lookup table, six columns.
//! - `OneHotPreprocessor`: raw categories expanded into indicator columns,
//!   optionally standardizing the numeric fields. Mirrors artifacts that were
//!   trained behind a column transformer instead of a manual encoding.

use serde::{Deserialize, Serialize};

use crate::domain::{FeatureEncoder, PatientInput, Region, Sex, Smoker, ORDINAL_FEATURE_NAMES};
use crate::ports::Preprocessor;

/// Preprocessing declared by a model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreprocessingSpec {
    Ordinal,
    OneHot {
        #[serde(default)]
        drop_first: bool,
        #[serde(default)]
        scaler: Option<StandardScaler>,
    },
}

impl Default for PreprocessingSpec {
    fn default() -> Self {
        Self::Ordinal
    }
}

impl PreprocessingSpec {
    /// Instantiate the described preprocessing stage.
    #[must_use]
    pub fn build(&self) -> Box<dyn Preprocessor> {
        match self {
            Self::Ordinal => Box::new(OrdinalPreprocessor),
            Self::OneHot { drop_first, scaler } => Box::new(OneHotPreprocessor {
                drop_first: *drop_first,
                scaler: scaler.clone(),
            }),
        }
    }
}

/// Standardization of the numeric fields, in `age, bmi, children` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: [f64; 3],
    pub scale: [f64; 3],
}

impl StandardScaler {
    fn apply(&self, values: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for i in 0..3 {
            // A zero scale means a constant column at training time.
            let scale = if self.scale[i] == 0.0 { 1.0 } else { self.scale[i] };
            out[i] = (values[i] - self.mean[i]) / scale;
        }
        out
    }
}

/// Fixed ordinal encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdinalPreprocessor;

impl Preprocessor for OrdinalPreprocessor {
    fn kind(&self) -> &'static str {
        "ordinal"
    }

    fn feature_names(&self) -> Vec<String> {
        ORDINAL_FEATURE_NAMES.iter().map(|s| (*s).to_string()).collect()
    }

    fn transform(&self, input: &PatientInput) -> Vec<f64> {
        FeatureEncoder::encode(input).to_vec()
    }
}

/// Indicator-column encoding.
///
/// Column order: `age, bmi, children`, then one column per category of
/// `sex`, `smoker`, `region` in vocabulary order, skipping the first category
/// of each when `drop_first` is set.
#[derive(Debug, Clone, Default)]
pub struct OneHotPreprocessor {
    pub drop_first: bool,
    pub scaler: Option<StandardScaler>,
}

impl OneHotPreprocessor {
    fn indicators<T: PartialEq + Copy>(&self, all: &[T], value: T, out: &mut Vec<f64>) {
        let skip = usize::from(self.drop_first);
        out.extend(
            all.iter()
                .skip(skip)
                .map(|c| if *c == value { 1.0 } else { 0.0 }),
        );
    }

    fn indicator_names(&self, field: &str, labels: &[&str], out: &mut Vec<String>) {
        let skip = usize::from(self.drop_first);
        out.extend(labels.iter().skip(skip).map(|l| format!("{field}_{l}")));
    }
}

impl Preprocessor for OneHotPreprocessor {
    fn kind(&self) -> &'static str {
        "one_hot"
    }

    fn feature_names(&self) -> Vec<String> {
        let mut names = vec!["age".to_string(), "bmi".to_string(), "children".to_string()];
        let sex: Vec<&str> = Sex::ALL.iter().map(Sex::as_str).collect();
        let smoker: Vec<&str> = Smoker::ALL.iter().map(Smoker::as_str).collect();
        let region: Vec<&str> = Region::ALL.iter().map(Region::as_str).collect();
        self.indicator_names("sex", &sex, &mut names);
        self.indicator_names("smoker", &smoker, &mut names);
        self.indicator_names("region", &region, &mut names);
        names
    }

    fn transform(&self, input: &PatientInput) -> Vec<f64> {
        let numeric = [
            f64::from(input.age),
            input.bmi,
            f64::from(input.children),
        ];
        let numeric = match &self.scaler {
            Some(scaler) => scaler.apply(numeric),
            None => numeric,
        };

        let mut row = numeric.to_vec();
        self.indicators(&Sex::ALL, input.sex, &mut row);
        self.indicators(&Smoker::ALL, input.smoker, &mut row);
        self.indicators(&Region::ALL, input.region, &mut row);
        row
    }
}
