//! Error types for the demand prediction core

use crate::artifacts::ArtifactKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the regression pipeline
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    NotFitted,
}

/// Why a persisted bundle could not be loaded.
///
/// Both variants are recoverable: `ArtifactStore::ensure_ready` answers
/// either one with a single retrain.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Missing artifacts: {}", join_kinds(.missing))]
    Missing { missing: Vec<ArtifactKind> },

    #[error("Incompatible artifact {kind}: {reason}")]
    Incompatible { kind: ArtifactKind, reason: String },
}

impl LoadError {
    pub fn incompatible(kind: ArtifactKind, reason: impl Into<String>) -> Self {
        Self::Incompatible {
            kind,
            reason: reason.into(),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, LoadError::Missing { .. })
    }
}

fn join_kinds(kinds: &[ArtifactKind]) -> String {
    kinds
        .iter()
        .map(|k| k.file_name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures of a training run; never caught inside the trainer
#[derive(Error, Debug)]
pub enum TrainError {
    #[error("Failed to read dataset {path:?}: {source}")]
    DatasetIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse dataset row {row}: {source}")]
    DatasetParse {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("Dataset is unusable: {0}")]
    InvalidDataset(String),

    #[error("Model fitting failed: {0}")]
    Fit(#[from] ModelError),

    #[error("Failed to persist artifacts: {0}")]
    Persist(#[from] PersistError),
}

/// Failures while writing the artifact bundle
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {kind}: {source}")]
    Encode {
        kind: ArtifactKind,
        #[source]
        source: bincode::Error,
    },
}

/// Terminal failure of `ensure_ready`; the serving process must halt
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Retraining failed: {0}")]
    Retrain(#[source] TrainError),

    #[error("Artifacts still unusable after retraining: {0}")]
    Reload(#[source] LoadError),
}

/// Failures while turning one observation into a prediction
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Model rejected input: {0}")]
    Model(#[from] ModelError),

    #[error("Model returned no output")]
    EmptyOutput,
}
