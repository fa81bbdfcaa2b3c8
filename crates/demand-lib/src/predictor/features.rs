//! Feature engineering for the demand model
//!
//! The same transformation runs over the full historical dataset at
//! training time and over a single observation at prediction time. It is a
//! pure per-row function: the output for a row never depends on how many
//! other rows were passed alongside it.

use crate::models::{RawObservation, RAW_INPUT_COLUMNS};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Columns added by `FeatureEngineer`, in output order
pub const DERIVED_COLUMNS: [&str; 7] = [
    "hr_sin",
    "hr_cos",
    "mnth_sin",
    "mnth_cos",
    "is_rush_hour",
    "is_weekend",
    "temp_x_hum",
];

/// Identifier and leak columns that never reach the model
pub const DROP_COLUMNS: [&str; 5] = ["instant", "dteday", "casual", "registered", "atemp"];

/// Hours counted as commuter peaks (7-9 AM, 5-7 PM)
pub const RUSH_HOURS: [u32; 6] = [7, 8, 9, 17, 18, 19];

/// Number of engineered columns (raw + derived)
pub const NUM_FEATURES: usize = RAW_INPUT_COLUMNS.len() + DERIVED_COLUMNS.len();

/// Engineered column names in the order `FeatureEngineer` produces them
pub fn engineered_columns() -> Vec<&'static str> {
    RAW_INPUT_COLUMNS
        .iter()
        .chain(DERIVED_COLUMNS.iter())
        .copied()
        .collect()
}

/// A raw observation with the derived columns attached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub raw: RawObservation,
    pub hr_sin: f64,
    pub hr_cos: f64,
    pub mnth_sin: f64,
    pub mnth_cos: f64,
    pub is_rush_hour: f64,
    pub is_weekend: f64,
    pub temp_x_hum: f64,
}

impl FeatureRow {
    /// Look up any engineered column by name
    pub fn get(&self, column: &str) -> Option<f64> {
        match column {
            "hr_sin" => Some(self.hr_sin),
            "hr_cos" => Some(self.hr_cos),
            "mnth_sin" => Some(self.mnth_sin),
            "mnth_cos" => Some(self.mnth_cos),
            "is_rush_hour" => Some(self.is_rush_hour),
            "is_weekend" => Some(self.is_weekend),
            "temp_x_hum" => Some(self.temp_x_hum),
            other => self.raw.get(other),
        }
    }

    /// Values in `engineered_columns()` order
    pub fn values(&self) -> [f64; NUM_FEATURES] {
        let raw = self.raw.values();
        let mut out = [0.0; NUM_FEATURES];
        out[..raw.len()].copy_from_slice(&raw);
        out[raw.len()..].copy_from_slice(&[
            self.hr_sin,
            self.hr_cos,
            self.mnth_sin,
            self.mnth_cos,
            self.is_rush_hour,
            self.is_weekend,
            self.temp_x_hum,
        ]);
        out
    }
}

/// Stateless transformation from raw observations to engineered rows
pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Engineer every row independently
    pub fn engineer(rows: &[RawObservation]) -> Vec<FeatureRow> {
        rows.iter().map(Self::engineer_one).collect()
    }

    pub fn engineer_one(obs: &RawObservation) -> FeatureRow {
        let (hr_sin, hr_cos) = cyclic(obs.hr, 24.0);
        let (mnth_sin, mnth_cos) = cyclic(obs.mnth, 12.0);

        FeatureRow {
            raw: *obs,
            hr_sin,
            hr_cos,
            mnth_sin,
            mnth_cos,
            is_rush_hour: flag(is_rush_hour(obs.hr)),
            is_weekend: flag(obs.workingday == 0.0),
            temp_x_hum: obs.temp * obs.hum,
        }
    }
}

/// True when `hour` is exactly one of `RUSH_HOURS`
pub fn is_rush_hour(hour: f64) -> bool {
    RUSH_HOURS.iter().any(|&h| hour == f64::from(h))
}

fn cyclic(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

fn flag(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

/// Frozen, ordered feature names captured at training time.
///
/// Serving reindexes every engineered row to this schema. Names the row
/// cannot supply are filled with zero rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Schema matching the current engineered column order
    pub fn engineered() -> Self {
        Self::new(engineered_columns().into_iter().map(String::from).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Dense vector in schema order, absent columns filled with 0.0
    pub fn reindex(&self, row: &FeatureRow) -> Vec<f64> {
        self.columns
            .iter()
            .map(|name| row.get(name).unwrap_or(0.0))
            .collect()
    }

    /// Stack reindexed rows into a design matrix
    pub fn to_matrix(&self, rows: &[FeatureRow]) -> Array2<f64> {
        let width = self.columns.len();
        let mut matrix = Array2::zeros((rows.len(), width));
        for (i, row) in rows.iter().enumerate() {
            for (j, name) in self.columns.iter().enumerate() {
                matrix[[i, j]] = row.get(name).unwrap_or(0.0);
            }
        }
        matrix
    }
}

/// Display labels for season codes
pub const SEASON_LABELS: [(u8, &str); 4] =
    [(1, "Spring"), (2, "Summer"), (3, "Fall"), (4, "Winter")];

/// Display labels for weather situation codes
pub const WEATHER_LABELS: [(u8, &str); 4] = [
    (1, "Clear / Partly Cloudy"),
    (2, "Mist / Cloudy"),
    (3, "Light Rain / Snow"),
    (4, "Heavy Rain / Snow"),
];

/// Display labels for weekday codes (0 = Sunday)
pub const WEEKDAY_LABELS: [(u8, &str); 7] = [
    (0, "Sunday"),
    (1, "Monday"),
    (2, "Tuesday"),
    (3, "Wednesday"),
    (4, "Thursday"),
    (5, "Friday"),
    (6, "Saturday"),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(hr: f64, mnth: f64, workingday: f64) -> RawObservation {
        RawObservation {
            season: 1.0,
            yr: 1.0,
            mnth,
            hr,
            holiday: 0.0,
            weekday: 3.0,
            workingday,
            weathersit: 1.0,
            temp: 0.5,
            hum: 0.6,
            windspeed: 0.2,
        }
    }

    #[test]
    fn test_engineering_is_deterministic() {
        let obs = observation(13.0, 4.0, 1.0);
        let a = FeatureEngineer::engineer_one(&obs).values();
        let b = FeatureEngineer::engineer_one(&obs).values();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_row_count_does_not_change_output() {
        let rows: Vec<_> = (0..24).map(|h| observation(h as f64, 7.0, 0.0)).collect();
        let batch = FeatureEngineer::engineer(&rows);
        for (obs, engineered) in rows.iter().zip(batch.iter()) {
            assert_eq!(*engineered, FeatureEngineer::engineer_one(obs));
        }
    }

    #[test]
    fn test_hour_encoding_wraps_midnight() {
        let point = |h: f64| {
            let row = FeatureEngineer::engineer_one(&observation(h, 1.0, 1.0));
            (row.hr_sin, row.hr_cos)
        };
        let dist =
            |a: (f64, f64), b: (f64, f64)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();

        let across_midnight = dist(point(23.0), point(0.0));
        let after_midnight = dist(point(0.0), point(1.0));
        assert!((across_midnight - after_midnight).abs() < 1e-12);
    }

    #[test]
    fn test_month_encoding_wraps_year() {
        let point = |m: f64| {
            let row = FeatureEngineer::engineer_one(&observation(0.0, m, 1.0));
            (row.mnth_sin, row.mnth_cos)
        };
        let (dec, jan, feb) = (point(12.0), point(1.0), point(2.0));
        let d1 = ((dec.0 - jan.0).powi(2) + (dec.1 - jan.1).powi(2)).sqrt();
        let d2 = ((jan.0 - feb.0).powi(2) + (jan.1 - feb.1).powi(2)).sqrt();
        assert!((d1 - d2).abs() < 1e-12);
    }

    #[test]
    fn test_rush_hour_set() {
        for hour in 0..24u32 {
            let row = FeatureEngineer::engineer_one(&observation(hour as f64, 1.0, 1.0));
            let expected = if RUSH_HOURS.contains(&hour) { 1.0 } else { 0.0 };
            assert_eq!(row.is_rush_hour, expected, "hour {}", hour);
        }
    }

    #[test]
    fn test_weekend_flag_follows_workingday() {
        assert_eq!(FeatureEngineer::engineer_one(&observation(8.0, 6.0, 0.0)).is_weekend, 1.0);
        assert_eq!(FeatureEngineer::engineer_one(&observation(8.0, 6.0, 1.0)).is_weekend, 0.0);
    }

    #[test]
    fn test_commute_scenario() {
        let row = FeatureEngineer::engineer_one(&observation(8.0, 6.0, 1.0));
        assert_eq!(row.is_rush_hour, 1.0);
        assert_eq!(row.is_weekend, 0.0);
        assert!((row.temp_x_hum - 0.30).abs() < 1e-12);
    }

    #[test]
    fn test_engineered_schema_has_eighteen_columns() {
        let schema = FeatureSchema::engineered();
        assert_eq!(schema.len(), NUM_FEATURES);
        assert_eq!(schema.len(), 18);
        assert_eq!(schema.columns()[0], "season");
        assert_eq!(schema.columns()[17], "temp_x_hum");
        for dropped in DROP_COLUMNS {
            assert!(!schema.columns().iter().any(|c| c == dropped));
        }
    }

    #[test]
    fn test_reindex_follows_schema_and_fills_zero() {
        let row = FeatureEngineer::engineer_one(&observation(8.0, 6.0, 1.0));
        let schema = FeatureSchema::new(vec![
            "temp_x_hum".to_string(),
            "hr".to_string(),
            "lagged_cnt".to_string(),
        ]);
        let values = schema.reindex(&row);
        assert_eq!(values.len(), 3);
        assert!((values[0] - 0.30).abs() < 1e-12);
        assert_eq!(values[1], 8.0);
        assert_eq!(values[2], 0.0);
    }

    #[test]
    fn test_to_matrix_matches_values() {
        let rows =
            FeatureEngineer::engineer(&[observation(1.0, 2.0, 1.0), observation(5.0, 9.0, 0.0)]);
        let matrix = FeatureSchema::engineered().to_matrix(&rows);
        assert_eq!(matrix.dim(), (2, NUM_FEATURES));
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in row.values().iter().enumerate() {
                assert_eq!(matrix[[i, j]], *v);
            }
        }
    }
}
