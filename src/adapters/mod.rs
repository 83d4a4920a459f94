//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `model`: JSON regression artifacts with manifest hash checks
//! - `preprocess`: ordinal and one-hot feature stages
//! - `sqlite`: SQLite for the local prediction log
//! - `csv`: record export

pub mod csv;
pub mod model;
pub mod preprocess;
pub mod sqlite;

pub use model::{LinearRegressor, ModelBundle, ModelLoadError, ModelLoader};
pub use preprocess::{OneHotPreprocessor, OrdinalPreprocessor, PreprocessingSpec, StandardScaler};
pub use sqlite::{SqliteRecordStore, StoreError};
