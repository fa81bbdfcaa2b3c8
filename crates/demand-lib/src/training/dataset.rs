//! Canonical dataset loading and the date-based partition

use crate::artifacts::compute_checksum;
use crate::error::TrainError;
use crate::models::HourlyRecord;
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Parsed historical rows plus a fingerprint of the file they came from
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<HourlyRecord>,
    /// SHA-256 of the raw file bytes
    pub fingerprint: String,
}

/// Read the hourly CSV, keeping rows in file order
pub fn load_dataset(path: &Path) -> Result<Dataset, TrainError> {
    let bytes = fs::read(path).map_err(|source| TrainError::DatasetIo {
        path: path.to_path_buf(),
        source,
    })?;
    let fingerprint = compute_checksum(&bytes);

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let mut records = Vec::new();
    for (i, result) in reader.deserialize::<HourlyRecord>().enumerate() {
        // +2: one for the header line, one for 1-based numbering
        let record = result.map_err(|source| TrainError::DatasetParse { row: i + 2, source })?;
        records.push(record);
    }

    if records.is_empty() {
        return Err(TrainError::InvalidDataset(format!(
            "{} contains no rows",
            path.display()
        )));
    }

    debug!(path = %path.display(), rows = records.len(), "Dataset loaded");
    Ok(Dataset {
        records,
        fingerprint,
    })
}

/// Row indices of each partition, in dataset order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Rows dated strictly before `boundary` train; the rest are held out
pub fn time_split(records: &[HourlyRecord], boundary: NaiveDate) -> TimeSplit {
    let (train, test): (Vec<usize>, Vec<usize>) =
        (0..records.len()).partition(|&i| records[i].dteday < boundary);
    TimeSplit { train, test }
}
