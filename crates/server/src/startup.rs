//! Blocking startup: obtain a usable artifact bundle before serving

use demand_lib::{
    artifacts::ReadinessState,
    health::HealthRegistry,
    observability::{ServiceMetrics, StructuredLogger},
    ArtifactBundle, ArtifactStore, Retrainer, StartupError, TrainError, Trainer, TrainingConfig,
    TrainingReport,
};

/// Retrainer that reports each retrain through metrics and lifecycle events
pub struct InstrumentedRetrainer<R> {
    inner: R,
    dataset: String,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl<R: Retrainer> InstrumentedRetrainer<R> {
    pub fn new(
        inner: R,
        dataset: impl Into<String>,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            inner,
            dataset: dataset.into(),
            metrics,
            logger,
        }
    }
}

impl<R: Retrainer> Retrainer for InstrumentedRetrainer<R> {
    fn retrain(&self) -> Result<TrainingReport, TrainError> {
        self.metrics.inc_retrains_triggered();
        self.logger.log_retrain_started(&self.dataset);

        let report = self.inner.retrain()?;
        self.metrics.set_training_duration(report.duration_secs);
        self.logger.log_retrain_completed(
            &report.run_id,
            report.duration_secs,
            report.metrics.mae,
            report.metrics.rmse,
            report.metrics.r2,
        );
        Ok(report)
    }
}

/// Load the bundle under `config.artifacts_dir`, retraining at most once.
///
/// Startup transitions are mirrored into `health`, except `Loaded`: the
/// caller marks that once the predictor is installed. Runs synchronously;
/// call it from a blocking context.
pub fn prepare_bundle(
    config: &TrainingConfig,
    health: &HealthRegistry,
    metrics: &ServiceMetrics,
    logger: &StructuredLogger,
) -> Result<ArtifactBundle, StartupError> {
    let store = ArtifactStore::new(&config.artifacts_dir);
    let retrainer = InstrumentedRetrainer::new(
        Trainer::new(config.clone()),
        config.dataset_path.display().to_string(),
        metrics.clone(),
        logger.clone(),
    );
    store.ensure_ready_with(&retrainer, |state| {
        if state != ReadinessState::Loaded {
            health.record(state);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use demand_lib::model::RegressionMetrics;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRetrainer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Retrainer for StubRetrainer {
        fn retrain(&self) -> Result<TrainingReport, TrainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TrainError::InvalidDataset("empty".to_string()));
            }
            Ok(TrainingReport {
                run_id: "stub".to_string(),
                total_rows: 2,
                train_rows: 1,
                test_rows: 1,
                feature_count: 18,
                metrics: RegressionMetrics {
                    mae: 1.0,
                    rmse: 1.0,
                    r2: 0.5,
                },
                duration_secs: 0.25,
                artifacts: Vec::new(),
            })
        }
    }

    #[test]
    fn test_instrumented_retrainer_counts_attempts() {
        let metrics = ServiceMetrics::new();
        let before = metrics.retrains_triggered();
        let retrainer = InstrumentedRetrainer::new(
            StubRetrainer {
                calls: AtomicUsize::new(0),
                fail: false,
            },
            "hour.csv",
            metrics.clone(),
            StructuredLogger::new("test"),
        );

        let report = retrainer.retrain().unwrap();
        assert_eq!(report.run_id, "stub");
        assert_eq!(retrainer.inner.calls.load(Ordering::SeqCst), 1);
        assert!(metrics.retrains_triggered() >= before + 1);
    }

    #[test]
    fn test_instrumented_retrainer_propagates_failure() {
        let retrainer = InstrumentedRetrainer::new(
            StubRetrainer {
                calls: AtomicUsize::new(0),
                fail: true,
            },
            "hour.csv",
            ServiceMetrics::new(),
            StructuredLogger::new("test"),
        );
        assert!(matches!(retrainer.retrain(), Err(TrainError::InvalidDataset(_))));
    }

    #[test]
    fn test_prepare_bundle_fails_without_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainingConfig {
            dataset_path: dir.path().join("missing.csv"),
            artifacts_dir: dir.path().join("artifacts"),
            ..Default::default()
        };
        let health = HealthRegistry::new();
        let err = prepare_bundle(
            &config,
            &health,
            &ServiceMetrics::new(),
            &StructuredLogger::new("test"),
        )
        .unwrap_err();
        assert!(matches!(err, StartupError::Retrain(TrainError::DatasetIo { .. })));
        assert_eq!(health.state(), ReadinessState::Failed);
        assert_eq!(
            health.transitions(),
            vec![
                ReadinessState::NotLoaded,
                ReadinessState::Retraining,
                ReadinessState::Failed
            ]
        );
    }
}
