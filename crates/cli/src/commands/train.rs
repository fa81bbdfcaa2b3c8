//! `train`: regenerate the artifact bundle from the canonical dataset

use crate::output::{
    format_bytes, print_header, print_json, print_success, print_table, OutputFormat,
};
use anyhow::{Context, Result};
use demand_lib::{ArtifactSummary, Trainer, TrainingConfig, TrainingReport};
use tabled::Tabled;
use tracing::info;

#[derive(Tabled)]
pub struct ArtifactRow {
    #[tabled(rename = "File")]
    pub file: String,
    #[tabled(rename = "Present")]
    pub present: String,
    #[tabled(rename = "Size")]
    pub size: String,
}

impl From<&ArtifactSummary> for ArtifactRow {
    fn from(summary: &ArtifactSummary) -> Self {
        Self {
            file: summary.file_name.to_string(),
            present: if summary.present { "yes" } else { "no" }.to_string(),
            size: summary
                .size_bytes
                .map(format_bytes)
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub fn run_training(config: TrainingConfig, format: OutputFormat) -> Result<()> {
    let dataset = config.dataset_path.display().to_string();
    info!(
        dataset = %dataset,
        artifacts_dir = %config.artifacts_dir.display(),
        "Training from CLI"
    );
    let report = Trainer::new(config)
        .run()
        .with_context(|| format!("Training on {} failed", dataset))?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &TrainingReport) {
    print_success(&format!("Training run {} completed", report.run_id));
    println!();
    print_header("Training Report");
    println!(
        "Rows:          {} ({} train / {} test)",
        report.total_rows, report.train_rows, report.test_rows
    );
    println!("Features:      {}", report.feature_count);
    println!("Duration:      {:.2}s", report.duration_secs);
    println!();
    print_header("Held-out Metrics");
    println!("MAE:           {:.3}", report.metrics.mae);
    println!("RMSE:          {:.3}", report.metrics.rmse);
    println!("R²:            {:.4}", report.metrics.r2);
    println!();

    let rows: Vec<ArtifactRow> = report.artifacts.iter().map(ArtifactRow::from).collect();
    print_table(&rows);
}
