//! Observability for the prediction service
//!
//! Provides:
//! - Prometheus metrics (prediction latency, served/failed predictions, retrains, model info)
//! - Structured JSON logging of lifecycle events with tracing

use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter,
    register_int_gauge, Encoder, Gauge, GaugeVec, Histogram, IntCounter, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for single-row prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_served: IntCounter,
    prediction_errors: IntCounter,
    validation_errors: IntCounter,
    retrains_triggered: IntCounter,
    training_duration_seconds: Gauge,
    model_info: GaugeVec,
    train_rows: IntGauge,
    test_rows: IntGauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "bike_demand_prediction_latency_seconds",
                "Time spent engineering features and scoring one observation",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_served: register_int_counter!(
                "bike_demand_predictions_served_total",
                "Total number of predictions returned to callers"
            )
            .expect("Failed to register predictions_served"),

            prediction_errors: register_int_counter!(
                "bike_demand_prediction_errors_total",
                "Total number of predictions the model failed to produce"
            )
            .expect("Failed to register prediction_errors"),

            validation_errors: register_int_counter!(
                "bike_demand_validation_errors_total",
                "Total number of prediction requests rejected as malformed"
            )
            .expect("Failed to register validation_errors"),

            retrains_triggered: register_int_counter!(
                "bike_demand_retrains_triggered_total",
                "Number of retrains started because artifacts were missing or incompatible"
            )
            .expect("Failed to register retrains_triggered"),

            training_duration_seconds: register_gauge!(
                "bike_demand_training_duration_seconds",
                "Wall-clock duration of the most recent training run"
            )
            .expect("Failed to register training_duration_seconds"),

            model_info: register_gauge_vec!(
                "bike_demand_model_info",
                "Information about the currently loaded artifact bundle",
                &["run_id"]
            )
            .expect("Failed to register model_info"),

            train_rows: register_int_gauge!(
                "bike_demand_train_rows",
                "Rows in the persisted training partition"
            )
            .expect("Failed to register train_rows"),

            test_rows: register_int_gauge!(
                "bike_demand_test_rows",
                "Rows in the persisted held-out partition"
            )
            .expect("Failed to register test_rows"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions_served(&self) {
        self.inner().predictions_served.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors.inc();
    }

    pub fn inc_validation_errors(&self) {
        self.inner().validation_errors.inc();
    }

    pub fn inc_retrains_triggered(&self) {
        self.inner().retrains_triggered.inc();
    }

    pub fn set_training_duration(&self, duration_secs: f64) {
        self.inner().training_duration_seconds.set(duration_secs);
    }

    /// Publish the loaded bundle's run id and partition sizes
    pub fn set_model_info(&self, run_id: &str, train_rows: usize, test_rows: usize) {
        let inner = self.inner();
        inner.model_info.reset();
        inner.model_info.with_label_values(&[run_id]).set(1.0);
        inner.train_rows.set(train_rows as i64);
        inner.test_rows.set(test_rows as i64);
    }

    pub fn predictions_served(&self) -> u64 {
        self.inner().predictions_served.get()
    }

    pub fn retrains_triggered(&self) -> u64 {
        self.inner().retrains_triggered.get()
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for service lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, artifacts_dir: &str) {
        info!(
            event = "service_started",
            instance = %self.instance,
            service_version = %version,
            artifacts_dir = %artifacts_dir,
            "Bike demand service started"
        );
    }

    pub fn log_artifacts_loaded(
        &self,
        run_id: &str,
        train_rows: usize,
        test_rows: usize,
        feature_count: usize,
    ) {
        info!(
            event = "artifacts_loaded",
            instance = %self.instance,
            run_id = %run_id,
            train_rows = train_rows,
            test_rows = test_rows,
            feature_count = feature_count,
            "Artifact bundle ready"
        );
    }

    pub fn log_retrain_started(&self, dataset: &str) {
        warn!(
            event = "retrain_started",
            instance = %self.instance,
            dataset = %dataset,
            "Artifacts missing or incompatible, retraining model"
        );
    }

    pub fn log_retrain_completed(
        &self,
        run_id: &str,
        duration_secs: f64,
        mae: f64,
        rmse: f64,
        r2: f64,
    ) {
        info!(
            event = "retrain_completed",
            instance = %self.instance,
            run_id = %run_id,
            duration_secs = duration_secs,
            mae = mae,
            rmse = rmse,
            r2 = r2,
            "Retraining complete"
        );
    }

    pub fn log_startup_failed(&self, reason: &str) {
        error!(
            event = "startup_failed",
            instance = %self.instance,
            reason = %reason,
            "Unable to obtain usable artifacts, halting"
        );
    }

    pub fn log_prediction(&self, run_id: &str, prediction: f64, actual: Option<f64>) {
        info!(
            event = "prediction_served",
            instance = %self.instance,
            run_id = %run_id,
            prediction = prediction,
            actual = ?actual,
            "Prediction served"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Bike demand service shutting down"
        );
    }
}
