//! Bike demand server
//!
//! Loads (or regenerates) the artifact bundle at startup, then serves
//! predictions and held-out data over a JSON API.

use anyhow::{Context, Result};
use demand_lib::{
    health::HealthRegistry,
    observability::{ServiceMetrics, StructuredLogger},
    DemandPredictor,
};
use demand_server::{api, config, startup};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting demand-server");

    let config = config::ServiceConfig::load()?;
    let training = config.training_config();
    info!(
        instance = %config.instance_name,
        artifacts_dir = %training.artifacts_dir.display(),
        dataset = %training.dataset_path.display(),
        "Service configured"
    );

    let health_registry = HealthRegistry::new();

    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(SERVICE_VERSION, &training.artifacts_dir.display().to_string());

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        logger.clone(),
    ));

    // Health and metrics are reachable while artifacts load; readiness stays false
    let mut api_handle = tokio::spawn(api::serve(config.api_port, app_state.clone()));

    let bundle = {
        let (health, metrics, logger) = (health_registry.clone(), metrics.clone(), logger.clone());
        tokio::task::spawn_blocking(move || {
            startup::prepare_bundle(&training, &health, &metrics, &logger)
        })
        .await
        .context("Startup task panicked")?
    };

    let bundle = match bundle {
        Ok(bundle) => bundle,
        Err(e) => {
            logger.log_startup_failed(&e.to_string());
            health_registry.mark_failed(e.to_string());
            api_handle.abort();
            return Err(anyhow::Error::new(e)
                .context("Startup failed: unable to load model artifacts"));
        }
    };

    metrics.set_model_info(
        bundle.run_id(),
        bundle.train_rows().len(),
        bundle.test_rows().len(),
    );
    logger.log_artifacts_loaded(
        bundle.run_id(),
        bundle.train_rows().len(),
        bundle.test_rows().len(),
        bundle.feature_schema().len(),
    );

    let run_id = bundle.run_id().to_string();
    app_state.install_predictor(DemandPredictor::new(Arc::new(bundle)));
    health_registry.mark_loaded(run_id);

    tokio::select! {
        result = &mut api_handle => {
            result.context("API server task panicked")??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            info!("Shutting down");
        }
    }

    Ok(())
}
