//! Model training and artifact generation
//!
//! One training run loads the canonical dataset, engineers features once,
//! splits by date, evaluates an evaluation-only pipeline on the held-out
//! rows, refits on everything and persists the full bundle.

mod dataset;

pub use dataset::{load_dataset, time_split, Dataset, TimeSplit};

use crate::artifacts::{ArtifactBundle, ArtifactStore, ArtifactSummary};
use crate::error::TrainError;
use crate::model::{DemandModel, DemandPipeline, ModelParams, RegressionMetrics};
use crate::models::{RawObservation, RawRecord, TestPredictions};
use crate::predictor::{clip_non_negative, FeatureEngineer, FeatureSchema};
use chrono::{DateTime, NaiveDate, Utc};
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// First day of the held-out partition
pub const DEFAULT_SPLIT_DATE: (i32, u32, u32) = (2012, 7, 1);

/// Length of the dataset fingerprint embedded in run ids
const RUN_ID_FINGERPRINT_LEN: usize = 12;

/// Inputs of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub dataset_path: PathBuf,
    pub artifacts_dir: PathBuf,
    pub split_date: NaiveDate,
    pub model: ModelParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/bike_sharing.csv"),
            artifacts_dir: PathBuf::from("artifacts"),
            split_date: default_split_date(),
            model: ModelParams::default(),
        }
    }
}

pub fn default_split_date() -> NaiveDate {
    let (y, m, d) = DEFAULT_SPLIT_DATE;
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

/// Outcome of a completed training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub run_id: String,
    pub total_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_count: usize,
    /// Held-out metrics of the evaluation-only pipeline
    pub metrics: RegressionMetrics,
    pub duration_secs: f64,
    pub artifacts: Vec<ArtifactSummary>,
}

/// Anything that can regenerate the artifact bundle on demand
pub trait Retrainer {
    fn retrain(&self) -> Result<TrainingReport, TrainError>;
}

/// Runs the full training pipeline described by a `TrainingConfig`
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.config.artifacts_dir)
    }

    /// Train, evaluate and persist. Errors are never swallowed here.
    pub fn run(&self) -> Result<TrainingReport, TrainError> {
        let started = Instant::now();
        let started_at = Utc::now();

        let dataset = load_dataset(&self.config.dataset_path)?;
        let run_id = make_run_id(started_at, &dataset.fingerprint);
        let records = &dataset.records;
        info!(
            run_id = %run_id,
            dataset = %self.config.dataset_path.display(),
            rows = records.len(),
            "Training run started"
        );

        let observations: Vec<RawObservation> = records.iter().map(|r| r.observation()).collect();
        let features = FeatureEngineer::engineer(&observations);
        let schema = FeatureSchema::engineered();
        let x_all = schema.to_matrix(&features);
        let y_all: Array1<f64> = records.iter().map(|r| r.cnt).collect();

        let split = time_split(records, self.config.split_date);
        if split.train.is_empty() {
            return Err(TrainError::InvalidDataset(format!(
                "no rows dated before {}",
                self.config.split_date
            )));
        }
        if split.test.is_empty() {
            return Err(TrainError::InvalidDataset(format!(
                "no rows dated on or after {}",
                self.config.split_date
            )));
        }
        info!(
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            split_date = %self.config.split_date,
            "Time-based split"
        );

        let x_train = x_all.select(Axis(0), &split.train);
        let y_train = y_all.select(Axis(0), &split.train);
        let x_test = x_all.select(Axis(0), &split.test);
        let y_test = y_all.select(Axis(0), &split.test);

        let mut evaluation = DemandPipeline::new(self.config.model.clone());
        evaluation.fit(&x_train, &y_train)?;
        let predicted: Vec<f64> = evaluation
            .predict(&x_test)?
            .iter()
            .map(|&p| clip_non_negative(p))
            .collect();
        let actual = y_test.to_vec();
        let metrics = RegressionMetrics::compute(&actual, &predicted).ok_or_else(|| {
            TrainError::InvalidDataset("held-out predictions are misaligned".to_string())
        })?;
        info!(
            mae = metrics.mae,
            rmse = metrics.rmse,
            r2 = metrics.r2,
            "Held-out evaluation"
        );

        let mut production = DemandPipeline::new(self.config.model.clone());
        production.fit(&x_all, &y_all)?;
        debug!("Production pipeline fitted on all rows");

        let raw_rows = |indices: &[usize]| -> Vec<RawRecord> {
            indices.iter().map(|&i| records[i].raw_record()).collect()
        };
        let train_rows = raw_rows(&split.train);
        let test_rows = raw_rows(&split.test);
        let feature_count = schema.len();

        let bundle = ArtifactBundle::new(
            run_id.clone(),
            production,
            schema,
            train_rows,
            test_rows,
            TestPredictions { actual, predicted },
        );
        let store = self.store();
        store.save(&bundle)?;

        let report = TrainingReport {
            run_id,
            total_rows: records.len(),
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            feature_count,
            metrics,
            duration_secs: started.elapsed().as_secs_f64(),
            artifacts: store.summary(),
        };
        info!(
            run_id = %report.run_id,
            duration_secs = report.duration_secs,
            "Training run completed"
        );
        Ok(report)
    }
}

impl Retrainer for Trainer {
    fn retrain(&self) -> Result<TrainingReport, TrainError> {
        self.run()
    }
}

/// `<UTC start time>-<dataset fingerprint prefix>`
pub fn make_run_id(started_at: DateTime<Utc>, fingerprint: &str) -> String {
    let prefix: String = fingerprint.chars().take(RUN_ID_FINGERPRINT_LEN).collect();
    format!("{}-{}", started_at.format("%Y%m%dT%H%M%S%.3fZ"), prefix)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Datelike, Duration, NaiveDate};
    use std::path::{Path, PathBuf};

    pub const HEADER: &str = "instant,dteday,season,yr,mnth,hr,holiday,weekday,workingday,\
                              weathersit,temp,atemp,hum,windspeed,casual,registered,cnt\n";

    /// Hourly CSV covering `days` days from 2012-06-25, in the canonical
    /// column layout. With 7 or more days both partitions are populated.
    pub fn synthetic_csv(days: usize) -> String {
        let start = NaiveDate::from_ymd_opt(2012, 6, 25).unwrap();
        let mut out = String::from(HEADER);
        let mut instant = 1;
        for d in 0..days {
            let date = start + Duration::days(d as i64);
            let weekday = date.weekday().num_days_from_sunday();
            let workingday = u32::from((1..=5).contains(&weekday));
            for hr in 0..24u32 {
                let temp = 0.5 + 0.01 * ((d % 5) as f64) + 0.005 * hr as f64;
                let hum = 0.6 - 0.01 * (hr % 6) as f64;
                let rush = [7, 8, 9, 17, 18, 19].contains(&hr);
                let base = if rush { 400.0 } else { 40.0 + 5.0 * hr as f64 };
                let cnt = base + if workingday == 1 { 30.0 } else { 0.0 };
                out.push_str(&format!(
                    "{},{},3,1,{},{},0,{},{},1,{:.3},{:.3},{:.3},0.2,{},{},{}\n",
                    instant,
                    date.format("%Y-%m-%d"),
                    date.month(),
                    hr,
                    weekday,
                    workingday,
                    temp,
                    temp,
                    hum,
                    (cnt * 0.2) as u32,
                    cnt as u32 - (cnt * 0.2) as u32,
                    cnt as u32,
                ));
                instant += 1;
            }
        }
        out
    }

    pub fn write_dataset(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("hour.csv");
        std::fs::write(&path, contents).unwrap();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{synthetic_csv, write_dataset};
    use super::*;
    use crate::error::TrainError;

    fn fast_config(dir: &std::path::Path, days: usize) -> TrainingConfig {
        TrainingConfig {
            dataset_path: write_dataset(dir, &synthetic_csv(days)),
            artifacts_dir: dir.join("artifacts"),
            split_date: default_split_date(),
            model: ModelParams {
                n_estimators: 20,
                max_depth: 3,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.split_date, NaiveDate::from_ymd_opt(2012, 7, 1).unwrap());
        assert_eq!(config.model.n_estimators, 300);
    }

    #[test]
    fn test_run_id_carries_fingerprint() {
        let at = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let id = make_run_id(at, "abcdef0123456789");
        assert_eq!(id, "20240301T120000.000Z-abcdef012345");
    }

    #[test]
    fn test_run_persists_full_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = Trainer::new(fast_config(dir.path(), 12));
        let report = trainer.run().unwrap();

        assert_eq!(report.total_rows, 288);
        assert_eq!(report.train_rows, 144);
        assert_eq!(report.test_rows, 144);
        assert_eq!(report.feature_count, 18);
        assert!(report.artifacts.iter().all(|a| a.present));

        let bundle = trainer.store().load().unwrap();
        assert_eq!(bundle.run_id(), report.run_id);
        assert_eq!(bundle.test_rows().len(), 144);
        assert_eq!(bundle.test_predictions().len(), 144);
        assert!(bundle.test_predictions().predicted.iter().all(|&p| p >= 0.0));
        assert_eq!(bundle.feature_schema(), &FeatureSchema::engineered());
    }

    #[test]
    fn test_held_out_metrics_are_reasonable() {
        let dir = tempfile::tempdir().unwrap();
        let report = Trainer::new(fast_config(dir.path(), 12)).run().unwrap();
        assert!(report.metrics.r2 > 0.5, "r2 = {}", report.metrics.r2);
        assert!(report.metrics.mae >= 0.0);
    }

    #[test]
    fn test_empty_held_out_partition_fails() {
        let dir = tempfile::tempdir().unwrap();
        // Six days from 2012-06-25 end on 2012-06-30
        let trainer = Trainer::new(fast_config(dir.path(), 6));
        assert!(matches!(trainer.run(), Err(TrainError::InvalidDataset(_))));
        assert!(!trainer.store().exists());
    }

    #[test]
    fn test_missing_dataset_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fast_config(dir.path(), 12);
        config.dataset_path = dir.path().join("absent.csv");
        let err = Trainer::new(config).run().unwrap_err();
        assert!(matches!(err, TrainError::DatasetIo { .. }));
    }
}
