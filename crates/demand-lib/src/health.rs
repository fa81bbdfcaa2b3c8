//! Health and readiness of the prediction service
//!
//! Both are derived from where startup is in the `ensure_ready` sequence.
//! The registry is written from the blocking startup thread and read by
//! the HTTP handlers, so it uses a std lock rather than an async one.

use crate::artifacts::ReadinessState;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still starting up; not serving predictions yet
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self { status, message }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub startup: ReadinessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub components: BTreeMap<&'static str, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub startup: ReadinessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names reported by `/healthz`
pub mod components {
    /// The persisted artifact bundle
    pub const ARTIFACTS: &str = "artifacts";
    pub const PREDICTOR: &str = "predictor";
}

#[derive(Debug)]
struct StartupStatus {
    state: ReadinessState,
    run_id: Option<String>,
    failure: Option<String>,
    transitions: Vec<ReadinessState>,
}

/// Shared view of the startup sequence
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    inner: Arc<RwLock<StartupStatus>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StartupStatus {
                state: ReadinessState::NotLoaded,
                run_id: None,
                failure: None,
                transitions: vec![ReadinessState::NotLoaded],
            })),
        }
    }

    /// Record a transition reported by `ensure_ready`.
    ///
    /// `Loaded` carries no run id here; use `mark_loaded` once the
    /// predictor is actually installed.
    pub fn record(&self, state: ReadinessState) {
        let mut status = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        status.state = state;
        status.transitions.push(state);
    }

    /// The bundle is installed and predictions can be served
    pub fn mark_loaded(&self, run_id: impl Into<String>) {
        let mut status = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        status.state = ReadinessState::Loaded;
        status.run_id = Some(run_id.into());
        status.failure = None;
        status.transitions.push(ReadinessState::Loaded);
    }

    /// Startup gave up; the process is about to exit
    pub fn mark_failed(&self, reason: impl Into<String>) {
        let mut status = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        status.state = ReadinessState::Failed;
        status.failure = Some(reason.into());
        status.transitions.push(ReadinessState::Failed);
    }

    pub fn state(&self) -> ReadinessState {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).state
    }

    /// Every state recorded so far, oldest first
    pub fn transitions(&self) -> Vec<ReadinessState> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .transitions
            .clone()
    }

    pub fn health(&self) -> HealthResponse {
        let status = self.inner.read().unwrap_or_else(PoisonError::into_inner);

        let (artifacts, predictor) = match status.state {
            ReadinessState::NotLoaded => (
                ComponentHealth::new(ComponentStatus::Degraded, Some("Loading artifacts".into())),
                ComponentHealth::new(ComponentStatus::Degraded, Some("Model not loaded".into())),
            ),
            ReadinessState::Retraining => (
                ComponentHealth::new(ComponentStatus::Degraded, Some("Retraining model".into())),
                ComponentHealth::new(ComponentStatus::Degraded, Some("Model not loaded".into())),
            ),
            ReadinessState::Loaded => (
                ComponentHealth::new(ComponentStatus::Healthy, None),
                ComponentHealth::new(ComponentStatus::Healthy, None),
            ),
            ReadinessState::Failed => (
                ComponentHealth::new(ComponentStatus::Unhealthy, status.failure.clone()),
                ComponentHealth::new(ComponentStatus::Unhealthy, Some("Model not loaded".into())),
            ),
        };
        let overall = match status.state {
            ReadinessState::Loaded => ComponentStatus::Healthy,
            ReadinessState::Failed => ComponentStatus::Unhealthy,
            _ => ComponentStatus::Degraded,
        };

        HealthResponse {
            status: overall,
            startup: status.state,
            run_id: status.run_id.clone(),
            components: BTreeMap::from([
                (components::ARTIFACTS, artifacts),
                (components::PREDICTOR, predictor),
            ]),
        }
    }

    /// Ready only once the loaded bundle is installed
    pub fn readiness(&self) -> ReadinessResponse {
        let status = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let reason = match status.state {
            ReadinessState::Loaded => None,
            ReadinessState::NotLoaded => Some("Artifacts not loaded yet".to_string()),
            ReadinessState::Retraining => Some("Retraining model".to_string()),
            ReadinessState::Failed => Some(
                status
                    .failure
                    .clone()
                    .unwrap_or_else(|| "Startup failed".to_string()),
            ),
        };

        ReadinessResponse {
            ready: reason.is_none(),
            startup: status.state,
            reason,
        }
    }
}
