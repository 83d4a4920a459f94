//! Model adapter: JSON linear-regression artifacts.
//!
//! An artifact directory holds `model.json` and, optionally, a
//! `manifest.json` binding file hashes:
//!
//! ```json
//! { "version": 1, "files": { "model.json": "<sha256 hex>" } }
//! ```
//!
//! When a manifest is present every listed file must exist and hash to the
//! recorded value. Setting `INSURANCE_REQUIRE_MODEL_MANIFEST=true` (or
//! `ModelLoader::require_manifest`) makes a missing manifest fatal.
//!
//! The artifact names the preprocessing it was trained behind, and loading
//! fails unless the artifact's `feature_names` are exactly the columns that
//! preprocessing produces.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::preprocess::PreprocessingSpec;
use crate::ports::{InferenceError, Preprocessor, Regressor};

/// Default artifact file name inside a model directory.
pub const MODEL_FILE: &str = "model.json";

/// Manifest file name inside a model directory.
pub const MANIFEST_FILE: &str = "manifest.json";

const SUPPORTED_FORMAT_VERSION: u32 = 1;

/// Error type for artifact loading.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Model artifact not found: {0}")]
    Missing(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed model artifact: {0}")]
    Format(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Model shape mismatch: {0}")]
    Shape(String),
}

/// Serialized linear model as exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default)]
    pub preprocessing: PreprocessingSpec,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ModelManifest {
    version: u32,
    files: BTreeMap<String, String>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn parse_bool_env(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn read(path: &Path) -> Result<Vec<u8>, ModelLoadError> {
    fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ModelLoadError::Missing(path.to_path_buf())
        } else {
            ModelLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Plain linear regressor: `intercept + sum(coefficients[i] * row[i])`.
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearRegressor {
    /// Build a regressor from raw parameters.
    #[must_use]
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }
}

impl Regressor for LinearRegressor {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, row: &[f64]) -> Result<f64, InferenceError> {
        if row.len() != self.coefficients.len() {
            return Err(InferenceError::FeatureCountMismatch {
                expected: self.coefficients.len(),
                got: row.len(),
            });
        }
        if let Some(index) = row.iter().position(|x| !x.is_finite()) {
            return Err(InferenceError::NonFiniteFeature { index });
        }

        let estimate = self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(c, x)| c * x)
                .sum::<f64>();

        if !estimate.is_finite() {
            return Err(InferenceError::NonFiniteOutput(estimate));
        }
        Ok(estimate)
    }
}

/// A loaded artifact together with the preprocessing it expects.
pub struct ModelBundle {
    pub regressor: LinearRegressor,
    pub preprocessor: Box<dyn Preprocessor>,
    /// File the parameters were read from
    pub source: PathBuf,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("preprocessing", &self.preprocessor.kind())
            .field("n_features", &self.regressor.n_features())
            .field("source", &self.source)
            .finish()
    }
}

impl ModelBundle {
    /// Check parameters against the declared preprocessing and assemble a bundle.
    ///
    /// # Errors
    /// Returns `ModelLoadError::Format` for an unsupported version or
    /// non-finite parameters, `ModelLoadError::Shape` when feature names or
    /// coefficient counts disagree with the preprocessing.
    pub fn from_artifact(artifact: ModelArtifact, source: PathBuf) -> Result<Self, ModelLoadError> {
        if artifact.format_version != SUPPORTED_FORMAT_VERSION {
            return Err(ModelLoadError::Format(format!(
                "Unsupported format_version {} (expected {SUPPORTED_FORMAT_VERSION})",
                artifact.format_version
            )));
        }
        if !artifact.intercept.is_finite() || artifact.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelLoadError::Format(
                "Model parameters must be finite numbers".into(),
            ));
        }

        let preprocessor = artifact.preprocessing.build();
        let expected = preprocessor.feature_names();
        if artifact.feature_names != expected {
            return Err(ModelLoadError::Shape(format!(
                "{} preprocessing produces {:?}, artifact was trained on {:?}",
                preprocessor.kind(),
                expected,
                artifact.feature_names
            )));
        }
        if artifact.coefficients.len() != expected.len() {
            return Err(ModelLoadError::Shape(format!(
                "{} coefficients for {} features",
                artifact.coefficients.len(),
                expected.len()
            )));
        }

        Ok(Self {
            regressor: LinearRegressor::new(artifact.coefficients, artifact.intercept),
            preprocessor,
            source,
        })
    }
}

/// Loads model artifacts from disk.
#[derive(Debug, Clone)]
pub struct ModelLoader {
    require_manifest: bool,
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLoader {
    /// Create a loader; a manifest is optional unless
    /// `INSURANCE_REQUIRE_MODEL_MANIFEST` is set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            require_manifest: parse_bool_env("INSURANCE_REQUIRE_MODEL_MANIFEST"),
        }
    }

    /// Override the manifest requirement.
    #[must_use]
    pub fn require_manifest(mut self, required: bool) -> Self {
        self.require_manifest = required;
        self
    }

    /// Load an artifact from a directory (reading `model.json`) or a file path.
    ///
    /// # Errors
    /// Returns `ModelLoadError` if the artifact is absent, unreadable,
    /// malformed, fails its manifest check, or does not fit its preprocessing.
    pub fn load(&self, path: &Path) -> Result<ModelBundle, ModelLoadError> {
        let (base_dir, model_path) = if path.is_dir() {
            (path.to_path_buf(), path.join(MODEL_FILE))
        } else {
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            (parent.to_path_buf(), path.to_path_buf())
        };

        if !model_path.exists() {
            return Err(ModelLoadError::Missing(model_path));
        }

        self.verify_manifest(&base_dir, &model_path)?;

        let content = read(&model_path)?;
        let artifact: ModelArtifact = serde_json::from_slice(&content)
            .map_err(|e| ModelLoadError::Format(e.to_string()))?;
        let bundle = ModelBundle::from_artifact(artifact, model_path)?;

        tracing::info!(
            "Loaded model from {:?} (preprocessing={}, n_features={})",
            bundle.source,
            bundle.preprocessor.kind(),
            bundle.regressor.n_features()
        );
        Ok(bundle)
    }

    /// Check every file bound by `manifest.json`, if present.
    fn verify_manifest(&self, base_dir: &Path, model_path: &Path) -> Result<(), ModelLoadError> {
        let manifest_path = base_dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            if self.require_manifest {
                tracing::error!("Model manifest not found at {:?}", manifest_path);
                return Err(ModelLoadError::Integrity(format!(
                    "{MANIFEST_FILE} required but not found in {}",
                    base_dir.display()
                )));
            }
            tracing::warn!("Loading model without {MANIFEST_FILE}; integrity not verified");
            return Ok(());
        }

        let manifest: ModelManifest = serde_json::from_slice(&read(&manifest_path)?)
            .map_err(|e| ModelLoadError::Format(format!("Invalid {MANIFEST_FILE}: {e}")))?;
        if manifest.version != 1 {
            return Err(ModelLoadError::Format(format!(
                "Unsupported manifest version: {}",
                manifest.version
            )));
        }

        let model_name = model_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(MODEL_FILE);
        if !manifest.files.contains_key(model_name) {
            return Err(ModelLoadError::Integrity(format!(
                "{MANIFEST_FILE} does not bind {model_name}"
            )));
        }

        for (rel, expected_hex) in &manifest.files {
            let bytes = read(&base_dir.join(rel))?;
            let actual_hex = sha256_hex(&bytes);
            if !actual_hex.eq_ignore_ascii_case(expected_hex.trim()) {
                return Err(ModelLoadError::Integrity(format!(
                    "File hash mismatch for {rel}"
                )));
            }
        }

        tracing::info!("Model manifest hashes verified");
        Ok(())
    }
}
