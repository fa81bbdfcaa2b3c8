//! Artifact persistence and startup readiness
//!
//! This module provides:
//! - The five-file artifact bundle that makes up one model version
//! - Incompatibility detection (missing, undecodable, mixed-run, mis-shaped)
//! - Whole-bundle writes through temporary files and renames
//! - `ensure_ready`, the single-retrain recovery policy used at startup

mod envelope;


pub use envelope::{compute_checksum, ARTIFACT_FORMAT_VERSION};

use crate::error::{LoadError, PersistError, StartupError};
use crate::model::{DemandModel, DemandPipeline};
use crate::models::{RawRecord, TestPredictions};
use crate::predictor::FeatureSchema;
use crate::training::Retrainer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// The five persisted objects of a model version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Model,
    TrainData,
    TestData,
    TestPredictions,
    FeatureNames,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Model,
        ArtifactKind::TrainData,
        ArtifactKind::TestData,
        ArtifactKind::TestPredictions,
        ArtifactKind::FeatureNames,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Model => "model.bin",
            ArtifactKind::TrainData => "train_data.bin",
            ArtifactKind::TestData => "test_data.bin",
            ArtifactKind::TestPredictions => "test_predictions.bin",
            ArtifactKind::FeatureNames => "feature_names.bin",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// One deployable model version, immutable once built
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    run_id: String,
    pipeline: DemandPipeline,
    feature_schema: FeatureSchema,
    train_rows: Vec<RawRecord>,
    test_rows: Vec<RawRecord>,
    test_predictions: TestPredictions,
}

impl ArtifactBundle {
    pub fn new(
        run_id: impl Into<String>,
        pipeline: DemandPipeline,
        feature_schema: FeatureSchema,
        train_rows: Vec<RawRecord>,
        test_rows: Vec<RawRecord>,
        test_predictions: TestPredictions,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            pipeline,
            feature_schema,
            train_rows,
            test_rows,
            test_predictions,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn pipeline(&self) -> &DemandPipeline {
        &self.pipeline
    }

    pub fn feature_schema(&self) -> &FeatureSchema {
        &self.feature_schema
    }

    pub fn train_rows(&self) -> &[RawRecord] {
        &self.train_rows
    }

    pub fn test_rows(&self) -> &[RawRecord] {
        &self.test_rows
    }

    pub fn test_predictions(&self) -> &TestPredictions {
        &self.test_predictions
    }

    /// Cross-artifact invariants a freshly loaded bundle must satisfy
    fn validate(&self) -> Result<(), LoadError> {
        if self.feature_schema.is_empty() {
            return Err(LoadError::incompatible(
                ArtifactKind::FeatureNames,
                "feature schema is empty",
            ));
        }
        if !self.pipeline.is_consistent() {
            return Err(LoadError::incompatible(
                ArtifactKind::Model,
                "pipeline is not structurally consistent",
            ));
        }
        if self.pipeline.n_features() != self.feature_schema.len() {
            return Err(LoadError::incompatible(
                ArtifactKind::Model,
                format!(
                    "model expects {} features but schema lists {}",
                    self.pipeline.n_features(),
                    self.feature_schema.len()
                ),
            ));
        }
        if !self.test_predictions.is_aligned() {
            return Err(LoadError::incompatible(
                ArtifactKind::TestPredictions,
                "actual and predicted arrays differ in length",
            ));
        }
        if self.test_predictions.len() != self.test_rows.len() {
            return Err(LoadError::incompatible(
                ArtifactKind::TestPredictions,
                format!(
                    "{} predictions for {} held-out rows",
                    self.test_predictions.len(),
                    self.test_rows.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Presence and size of one artifact file
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub kind: ArtifactKind,
    pub file_name: &'static str,
    pub present: bool,
    pub size_bytes: Option<u64>,
}

/// Where `ensure_ready` is in its startup sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    NotLoaded,
    Retraining,
    Loaded,
    Failed,
}

/// Reads and writes the artifact bundle under one directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    fn temp_path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(format!("{}.tmp", kind.file_name()))
    }

    /// Kinds whose file is absent
    pub fn missing(&self) -> Vec<ArtifactKind> {
        ArtifactKind::ALL
            .into_iter()
            .filter(|kind| !self.path(*kind).is_file())
            .collect()
    }

    /// True only if all five artifact files are present
    pub fn exists(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn summary(&self) -> Vec<ArtifactSummary> {
        ArtifactKind::ALL
            .into_iter()
            .map(|kind| {
                let size_bytes = fs::metadata(self.path(kind))
                    .ok()
                    .filter(|m| m.is_file())
                    .map(|m| m.len());
                ArtifactSummary {
                    kind,
                    file_name: kind.file_name(),
                    present: size_bytes.is_some(),
                    size_bytes,
                }
            })
            .collect()
    }

    /// Load all five artifacts; any failure invalidates the whole bundle
    pub fn load(&self) -> Result<ArtifactBundle, LoadError> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(LoadError::Missing { missing });
        }

        let (model_run, pipeline): (String, DemandPipeline) = self.read(ArtifactKind::Model)?;
        let (schema_run, columns): (String, Vec<String>) = self.read(ArtifactKind::FeatureNames)?;
        let (train_run, train_rows): (String, Vec<RawRecord>) = self.read(ArtifactKind::TrainData)?;
        let (test_run, test_rows): (String, Vec<RawRecord>) = self.read(ArtifactKind::TestData)?;
        let (preds_run, test_predictions): (String, TestPredictions) =
            self.read(ArtifactKind::TestPredictions)?;

        for (kind, run) in [
            (ArtifactKind::FeatureNames, &schema_run),
            (ArtifactKind::TrainData, &train_run),
            (ArtifactKind::TestData, &test_run),
            (ArtifactKind::TestPredictions, &preds_run),
        ] {
            if *run != model_run {
                return Err(LoadError::incompatible(
                    kind,
                    format!("written by run {} but model is from run {}", run, model_run),
                ));
            }
        }

        let bundle = ArtifactBundle::new(
            model_run,
            pipeline,
            FeatureSchema::new(columns),
            train_rows,
            test_rows,
            test_predictions,
        );
        bundle.validate()?;

        debug!(run_id = %bundle.run_id, dir = %self.dir.display(), "Artifact bundle loaded");
        Ok(bundle)
    }

    fn read<T: serde::de::DeserializeOwned>(
        &self,
        kind: ArtifactKind,
    ) -> Result<(String, T), LoadError> {
        let path = self.path(kind);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoadError::Missing {
                missing: vec![kind],
            },
            _ => LoadError::incompatible(kind, format!("unreadable file: {}", e)),
        })?;
        envelope::decode(kind, &bytes)
    }

    /// Persist a bundle, replacing whatever was there.
    ///
    /// Everything is encoded before the directory is touched. Payloads go to
    /// `*.tmp` siblings first; the old bundle is removed and the temporary
    /// files are renamed into place, so `exists()` only turns true once the
    /// last rename has landed.
    pub fn save(&self, bundle: &ArtifactBundle) -> Result<(), PersistError> {
        let run_id = bundle.run_id();
        let encoded = [
            (
                ArtifactKind::Model,
                envelope::encode(ArtifactKind::Model, run_id, &bundle.pipeline)?,
            ),
            (
                ArtifactKind::TrainData,
                envelope::encode(ArtifactKind::TrainData, run_id, &bundle.train_rows)?,
            ),
            (
                ArtifactKind::TestData,
                envelope::encode(ArtifactKind::TestData, run_id, &bundle.test_rows)?,
            ),
            (
                ArtifactKind::TestPredictions,
                envelope::encode(ArtifactKind::TestPredictions, run_id, &bundle.test_predictions)?,
            ),
            (
                ArtifactKind::FeatureNames,
                envelope::encode(
                    ArtifactKind::FeatureNames,
                    run_id,
                    &bundle.feature_schema.columns().to_vec(),
                )?,
            ),
        ];

        fs::create_dir_all(&self.dir).map_err(|source| PersistError::Io {
            path: self.dir.clone(),
            source,
        })?;

        for (kind, bytes) in &encoded {
            write_synced(&self.temp_path(*kind), bytes)?;
        }

        for kind in ArtifactKind::ALL {
            let path = self.path(kind);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(PersistError::Io { path, source }),
            }
        }

        for (kind, _) in &encoded {
            let from = self.temp_path(*kind);
            let to = self.path(*kind);
            fs::rename(&from, &to).map_err(|source| PersistError::Io { path: to, source })?;
        }

        info!(
            run_id = %run_id,
            dir = %self.dir.display(),
            "Artifact bundle saved"
        );
        Ok(())
    }

    /// Return a usable bundle, retraining at most once.
    ///
    /// `NotLoaded -> Loaded` when the existing bundle loads;
    /// `NotLoaded -> Retraining -> Loaded` when it is missing or
    /// incompatible; `Failed` when the retrain or the reload after it fails.
    pub fn ensure_ready<R: Retrainer + ?Sized>(
        &self,
        retrainer: &R,
    ) -> Result<ArtifactBundle, StartupError> {
        self.ensure_ready_with(retrainer, |_| {})
    }

    /// `ensure_ready`, reporting every state it enters to `on_transition`
    pub fn ensure_ready_with<R, F>(
        &self,
        retrainer: &R,
        mut on_transition: F,
    ) -> Result<ArtifactBundle, StartupError>
    where
        R: Retrainer + ?Sized,
        F: FnMut(ReadinessState),
    {
        info!(dir = %self.dir.display(), "Loading artifacts");

        let first_attempt = if self.exists() {
            self.load()
        } else {
            Err(LoadError::Missing {
                missing: self.missing(),
            })
        };

        match first_attempt {
            Ok(bundle) => {
                info!(run_id = %bundle.run_id(), "Artifacts loaded");
                on_transition(ReadinessState::Loaded);
                return Ok(bundle);
            }
            Err(e) => {
                warn!(error = %e, "Artifacts missing or incompatible, retraining");
            }
        }

        info!("Retraining model from the canonical dataset");
        on_transition(ReadinessState::Retraining);

        if let Err(e) = retrainer.retrain() {
            error!(error = %e, "Retraining failed");
            on_transition(ReadinessState::Failed);
            return Err(StartupError::Retrain(e));
        }

        match self.load() {
            Ok(bundle) => {
                info!(run_id = %bundle.run_id(), "Artifacts loaded after retraining");
                on_transition(ReadinessState::Loaded);
                Ok(bundle)
            }
            Err(e) => {
                error!(error = %e, "Artifacts unusable even after retraining");
                on_transition(ReadinessState::Failed);
                Err(StartupError::Reload(e))
            }
        }
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    Ok(())
}
