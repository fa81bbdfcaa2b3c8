//! Core library for hourly bike-rental demand prediction
//!
//! This crate provides the core functionality for:
//! - Feature engineering from raw calendar and weather observations
//! - A native scaler + gradient-boosted-trees regression pipeline
//! - Time-based training and evaluation
//! - Versioned artifact persistence with single-retrain recovery
//! - Health checks and observability

pub mod artifacts;
pub mod error;
pub mod health;
pub mod model;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod training;

pub use artifacts::{ArtifactBundle, ArtifactKind, ArtifactStore, ArtifactSummary, ReadinessState};
pub use error::{LoadError, ModelError, PersistError, PredictError, StartupError, TrainError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use predictor::{DemandPredictor, FeatureSchema, PredictionOutcome};
pub use training::{Retrainer, Trainer, TrainingConfig, TrainingReport};
