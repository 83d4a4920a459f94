//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (model artifact, feature
//! stage, persistent storage).

mod preprocessor;
mod regressor;
mod storage;

pub use preprocessor::Preprocessor;
pub use regressor::{InferenceError, Regressor};
pub use storage::{RecordPage, RecordStore, SortOrder, StoreState};
