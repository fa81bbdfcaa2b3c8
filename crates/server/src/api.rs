//! HTTP API: predictions, held-out data, health checks and Prometheus metrics

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use demand_lib::{
    health::{ComponentStatus, HealthRegistry},
    model::{ModelParams, RegressionMetrics},
    models::{RawObservation, RawRecord, RAW_INPUT_COLUMNS, TARGET},
    observability::{ServiceMetrics, StructuredLogger},
    predictor::{
        FeatureImportance, InferenceStats, SEASON_LABELS, WEATHER_LABELS, WEEKDAY_LABELS,
    },
    DemandPredictor, PredictError,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};

/// Year flag assumed when a prediction request omits `yr` (1 = the later,
/// higher-demand year). Applies to `yr` only.
pub const DEFAULT_YEAR_FLAG: f64 = 1.0;

/// Default page size for the data endpoints
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// Largest page the data endpoints will return
pub const MAX_PAGE_LIMIT: usize = 500;

/// Default number of actual/predicted pairs returned for charting
pub const DEFAULT_CHART_LIMIT: usize = 200;

/// Number of most important features listed by `/api/summary`
pub const SUMMARY_TOP_FEATURES: usize = 5;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
    predictor: Arc<OnceLock<Arc<DemandPredictor>>>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            logger,
            predictor: Arc::new(OnceLock::new()),
        }
    }

    /// Install the loaded predictor. Only the first call has any effect.
    pub fn install_predictor(&self, predictor: DemandPredictor) -> bool {
        self.predictor.set(Arc::new(predictor)).is_ok()
    }

    pub fn predictor(&self) -> Option<&Arc<DemandPredictor>> {
        self.predictor.get()
    }

    fn ready_predictor(&self) -> Result<&Arc<DemandPredictor>, ApiError> {
        self.predictor().ok_or(ApiError::NotReady)
    }
}

/// A prediction request the boundary refuses to pass to the model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid value for field: {0}")]
    InvalidValue(String),
}

/// Errors returned by API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Model not loaded")]
    NotReady,

    #[error("No held-out rows available")]
    NoTestData,

    #[error("Prediction failed: {0}")]
    Prediction(#[from] PredictError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NoTestData => StatusCode::NOT_FOUND,
            ApiError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Accept JSON numbers and strings that parse as finite floats
fn coerce_number(field: &str, value: &Value) -> Result<f64, ValidationError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::InvalidValue(field.to_string()))
}

/// Decode the raw observation and optional ground truth from a request body
pub fn parse_prediction_request(
    body: &Map<String, Value>,
) -> Result<(RawObservation, Option<f64>), ValidationError> {
    let mut values = [0.0; 11];
    for (slot, column) in values.iter_mut().zip(RAW_INPUT_COLUMNS) {
        *slot = match body.get(column) {
            None | Some(Value::Null) if column == "yr" => DEFAULT_YEAR_FLAG,
            None | Some(Value::Null) => {
                return Err(ValidationError::MissingField(column.to_string()))
            }
            Some(value) => coerce_number(column, value)?,
        };
    }

    let actual = match body.get("actual") {
        None | Some(Value::Null) => None,
        Some(value) => Some(coerce_number("actual", value)?),
    };

    Ok((RawObservation::from_values(values), actual))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let predictor = state.ready_predictor()?;
    let (observation, actual) = parse_prediction_request(&body).map_err(|e| {
        state.metrics.inc_validation_errors();
        e
    })?;

    let start = Instant::now();
    let outcome = predictor
        .predict_with_actual(&observation, actual)
        .map_err(|e| {
            state.metrics.inc_prediction_errors();
            error!(error = %e, "Prediction failed");
            e
        })?;
    state.metrics.observe_prediction_latency(start.elapsed().as_secs_f64());
    state.metrics.inc_predictions_served();
    state
        .logger
        .log_prediction(predictor.run_id(), outcome.prediction, outcome.actual);

    Ok(Json(outcome))
}

/// Columns holding category codes or counts, emitted as JSON integers
const INTEGER_COLUMNS: [&str; 9] = [
    "season",
    "yr",
    "mnth",
    "hr",
    "holiday",
    "weekday",
    "workingday",
    "weathersit",
    TARGET,
];

fn column_value(column: &str, value: f64) -> Value {
    let whole = value.fract() == 0.0 && value.abs() <= i64::MAX as f64;
    if whole && INTEGER_COLUMNS.contains(&column) {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// One raw row as a JSON object, codes as integers and measurements as floats
pub fn row_to_json(row: &RawRecord) -> Map<String, Value> {
    RAW_INPUT_COLUMNS
        .iter()
        .zip(row.observation().values())
        .chain(std::iter::once((&TARGET, row.cnt)))
        .map(|(column, value)| (column.to_string(), column_value(column, value)))
        .collect()
}

async fn test_sample(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let rows = state.ready_predictor()?.bundle().test_rows();
    if rows.is_empty() {
        return Err(ApiError::NoTestData);
    }
    let index = rand::thread_rng().gen_range(0..rows.len());
    let mut sample = row_to_json(&rows[index]);
    sample.insert("_index".to_string(), Value::from(index));
    Ok(Json(sample))
}

/// Paging parameters for the data endpoints
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Page {
    data: Vec<Map<String, Value>>,
    total: usize,
    offset: usize,
    limit: usize,
}

fn page(rows: &[RawRecord], params: &PageParams) -> Page {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    let offset = params.offset.unwrap_or(0);
    let start = offset.min(rows.len());
    let end = start.saturating_add(limit).min(rows.len());
    Page {
        data: rows[start..end].iter().map(row_to_json).collect(),
        total: rows.len(),
        offset,
        limit,
    }
}

async fn train_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let bundle = state.ready_predictor()?.bundle();
    Ok(Json(page(bundle.train_rows(), &params)).into_response())
}

async fn test_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let bundle = state.ready_predictor()?.bundle();
    Ok(Json(page(bundle.test_rows(), &params)).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartParams {
    pub limit: Option<usize>,
}

async fn actual_vs_predicted(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChartParams>,
) -> Result<impl IntoResponse, ApiError> {
    let predictions = state.ready_predictor()?.bundle().test_predictions();
    let total = predictions.len();
    let n = params.limit.unwrap_or(DEFAULT_CHART_LIMIT).min(total);
    Ok(Json(json!({
        "actual": &predictions.actual[..n],
        "predicted": &predictions.predicted[..n],
        "total": total,
    })))
}

#[derive(Debug, Serialize)]
struct Summary {
    run_id: String,
    train_count: usize,
    test_count: usize,
    total_count: usize,
    feature_count: usize,
    metrics: Option<RegressionMetrics>,
    model: ModelSummary,
    inference: InferenceStats,
}

#[derive(Debug, Serialize)]
struct ModelSummary {
    params: ModelParams,
    top_features: Vec<FeatureImportance>,
}

async fn summary(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let predictor = state.ready_predictor()?;
    let bundle = predictor.bundle();
    let predictions = bundle.test_predictions();
    Ok(Json(Summary {
        run_id: bundle.run_id().to_string(),
        train_count: bundle.train_rows().len(),
        test_count: bundle.test_rows().len(),
        total_count: bundle.train_rows().len() + bundle.test_rows().len(),
        feature_count: bundle.feature_schema().len(),
        metrics: RegressionMetrics::compute(&predictions.actual, &predictions.predicted),
        model: ModelSummary {
            params: bundle.pipeline().params().clone(),
            top_features: predictor.top_features(SUMMARY_TOP_FEATURES),
        },
        inference: predictor.stats(),
    }))
}

fn label_map(labels: &[(u8, &'static str)]) -> BTreeMap<u8, &'static str> {
    labels.iter().copied().collect()
}

async fn reference() -> impl IntoResponse {
    Json(json!({
        "season": label_map(&SEASON_LABELS),
        "weathersit": label_map(&WEATHER_LABELS),
        "weekday": label_map(&WEEKDAY_LABELS),
    }))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health();

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once artifacts are loaded
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness();

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/predict", post(predict))
        .route("/api/test-sample", get(test_sample))
        .route("/api/train-data", get(train_data))
        .route("/api/test-data", get(test_data))
        .route("/api/actual-vs-predicted", get(actual_vs_predicted))
        .route("/api/summary", get(summary))
        .route("/api/reference", get(reference))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
