//! `status`: inspect the artifact directory without serving

use crate::commands::train::ArtifactRow;
use crate::output::{
    print_header, print_info, print_json, print_success, print_table, print_warning,
    OutputFormat,
};
use anyhow::Result;
use colored::Colorize;
use demand_lib::{ArtifactStore, ArtifactSummary, LoadError};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct StatusReport {
    artifacts_dir: String,
    artifacts: Vec<ArtifactSummary>,
    loadable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    train_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn show_status(artifacts_dir: &Path, format: OutputFormat) -> Result<()> {
    let store = ArtifactStore::new(artifacts_dir);
    let artifacts = store.summary();

    let mut report = StatusReport {
        artifacts_dir: artifacts_dir.display().to_string(),
        artifacts,
        loadable: false,
        run_id: None,
        train_rows: None,
        test_rows: None,
        error: None,
    };
    let load_error = match store.load() {
        Ok(bundle) => {
            report.loadable = true;
            report.run_id = Some(bundle.run_id().to_string());
            report.train_rows = Some(bundle.train_rows().len());
            report.test_rows = Some(bundle.test_rows().len());
            None
        }
        Err(e) => {
            report.error = Some(e.to_string());
            Some(e)
        }
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            print_header("Artifact Status");
            println!("Directory:     {}", report.artifacts_dir.cyan());
            println!();
            let rows: Vec<ArtifactRow> = report.artifacts.iter().map(ArtifactRow::from).collect();
            print_table(&rows);
            println!();

            match (&report.run_id, load_error) {
                (Some(run_id), _) => {
                    print_success(&format!("Bundle {} is loadable", run_id));
                    println!(
                        "Rows:          {} train / {} test",
                        report.train_rows.unwrap_or_default(),
                        report.test_rows.unwrap_or_default()
                    );
                }
                (None, Some(e @ LoadError::Missing { .. })) => {
                    print_warning(&e.to_string());
                    print_info("Run `bikedemand train` or start the server to regenerate them.");
                }
                (None, Some(e)) => {
                    print_warning(&e.to_string());
                    print_info("The bundle will be regenerated on the next server start.");
                }
                (None, None) => {}
            }
        }
    }

    Ok(())
}
