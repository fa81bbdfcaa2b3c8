//! `predict`: score one observation against the stored bundle

use crate::output::{color_error_pct, print_header, print_json, OutputFormat};
use anyhow::{Context, Result};
use colored::Colorize;
use demand_lib::{models::RawObservation, ArtifactStore, DemandPredictor};
use std::path::Path;
use std::sync::Arc;

pub fn predict_one(
    artifacts_dir: &Path,
    observation: RawObservation,
    actual: Option<f64>,
    format: OutputFormat,
) -> Result<()> {
    let bundle = ArtifactStore::new(artifacts_dir)
        .load()
        .with_context(|| format!("Unable to load artifacts from {}", artifacts_dir.display()))?;
    let predictor = DemandPredictor::new(Arc::new(bundle));
    let outcome = predictor.predict_with_actual(&observation, actual)?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Table => {
            print_header("Demand Prediction");
            println!("Model:         {}", predictor.run_id().cyan());
            println!("Prediction:    {} rentals", outcome.prediction.to_string().bold());
            if let (Some(actual), Some(abs), Some(pct)) =
                (outcome.actual, outcome.error_abs, outcome.error_pct)
            {
                println!("Actual:        {}", actual);
                println!("Abs. error:    {}", abs);
                println!("Error:         {}", color_error_pct(pct));
            }
        }
    }

    Ok(())
}
