//! Core data models for bike demand prediction

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw input columns in the order the dataset carries them
pub const RAW_INPUT_COLUMNS: [&str; 11] = [
    "season",
    "yr",
    "mnth",
    "hr",
    "holiday",
    "weekday",
    "workingday",
    "weathersit",
    "temp",
    "hum",
    "windspeed",
];

/// Name of the regression target column
pub const TARGET: &str = "cnt";

/// One hourly record of calendar and weather conditions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub season: f64,
    pub yr: f64,
    pub mnth: f64,
    pub hr: f64,
    pub holiday: f64,
    pub weekday: f64,
    pub workingday: f64,
    pub weathersit: f64,
    pub temp: f64,
    pub hum: f64,
    pub windspeed: f64,
}

impl RawObservation {
    /// Look up a raw field by its column name
    pub fn get(&self, column: &str) -> Option<f64> {
        let value = match column {
            "season" => self.season,
            "yr" => self.yr,
            "mnth" => self.mnth,
            "hr" => self.hr,
            "holiday" => self.holiday,
            "weekday" => self.weekday,
            "workingday" => self.workingday,
            "weathersit" => self.weathersit,
            "temp" => self.temp,
            "hum" => self.hum,
            "windspeed" => self.windspeed,
            _ => return None,
        };
        Some(value)
    }

    /// Build an observation from values given in `RAW_INPUT_COLUMNS` order
    pub fn from_values(values: [f64; 11]) -> Self {
        let [season, yr, mnth, hr, holiday, weekday, workingday, weathersit, temp, hum, windspeed] =
            values;
        Self {
            season,
            yr,
            mnth,
            hr,
            holiday,
            weekday,
            workingday,
            weathersit,
            temp,
            hum,
            windspeed,
        }
    }

    /// Values in `RAW_INPUT_COLUMNS` order
    pub fn values(&self) -> [f64; 11] {
        [
            self.season,
            self.yr,
            self.mnth,
            self.hr,
            self.holiday,
            self.weekday,
            self.workingday,
            self.weathersit,
            self.temp,
            self.hum,
            self.windspeed,
        ]
    }
}

/// One row of the canonical hourly dataset.
///
/// The identifier and leak columns are optional so that trimmed exports
/// without them still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRecord {
    #[serde(default)]
    pub instant: Option<u64>,
    pub dteday: NaiveDate,
    pub season: f64,
    pub yr: f64,
    pub mnth: f64,
    pub hr: f64,
    pub holiday: f64,
    pub weekday: f64,
    pub workingday: f64,
    pub weathersit: f64,
    pub temp: f64,
    #[serde(default)]
    pub atemp: Option<f64>,
    pub hum: f64,
    pub windspeed: f64,
    #[serde(default)]
    pub casual: Option<f64>,
    #[serde(default)]
    pub registered: Option<f64>,
    pub cnt: f64,
}

impl HourlyRecord {
    /// Project away the date, identifier and leak columns
    pub fn observation(&self) -> RawObservation {
        RawObservation {
            season: self.season,
            yr: self.yr,
            mnth: self.mnth,
            hr: self.hr,
            holiday: self.holiday,
            weekday: self.weekday,
            workingday: self.workingday,
            weathersit: self.weathersit,
            temp: self.temp,
            hum: self.hum,
            windspeed: self.windspeed,
        }
    }

    /// The 11 raw fields plus the target, as persisted in the split tables
    pub fn raw_record(&self) -> RawRecord {
        RawRecord::new(self.observation(), self.cnt)
    }
}

/// Raw fields plus observed demand; the row type of the persisted splits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub season: f64,
    pub yr: f64,
    pub mnth: f64,
    pub hr: f64,
    pub holiday: f64,
    pub weekday: f64,
    pub workingday: f64,
    pub weathersit: f64,
    pub temp: f64,
    pub hum: f64,
    pub windspeed: f64,
    pub cnt: f64,
}

impl RawRecord {
    pub fn new(observation: RawObservation, cnt: f64) -> Self {
        Self {
            season: observation.season,
            yr: observation.yr,
            mnth: observation.mnth,
            hr: observation.hr,
            holiday: observation.holiday,
            weekday: observation.weekday,
            workingday: observation.workingday,
            weathersit: observation.weathersit,
            temp: observation.temp,
            hum: observation.hum,
            windspeed: observation.windspeed,
            cnt,
        }
    }

    pub fn observation(&self) -> RawObservation {
        RawObservation {
            season: self.season,
            yr: self.yr,
            mnth: self.mnth,
            hr: self.hr,
            holiday: self.holiday,
            weekday: self.weekday,
            workingday: self.workingday,
            weathersit: self.weathersit,
            temp: self.temp,
            hum: self.hum,
            windspeed: self.windspeed,
        }
    }
}

/// Held-out actual and predicted demand, index-aligned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestPredictions {
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
}

impl TestPredictions {
    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }

    pub fn is_aligned(&self) -> bool {
        self.actual.len() == self.predicted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_matches_column_order() {
        let values = [1.0, 1.0, 6.0, 8.0, 0.0, 3.0, 1.0, 1.0, 0.5, 0.6, 0.2];
        let obs = RawObservation::from_values(values);
        for (column, expected) in RAW_INPUT_COLUMNS.iter().zip(values) {
            assert_eq!(obs.get(column), Some(expected), "column {}", column);
        }
        assert_eq!(obs.get("atemp"), None);
        assert_eq!(obs.values(), values);
    }

    #[test]
    fn test_hourly_record_parses_without_leak_columns() {
        let data = "dteday,season,yr,mnth,hr,holiday,weekday,workingday,\
                    weathersit,temp,hum,windspeed,cnt\n\
                    2011-01-01,1,0,1,0,0,6,0,1,0.24,0.81,0.0,16\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let record: HourlyRecord = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(record.dteday, NaiveDate::from_ymd_opt(2011, 1, 1).unwrap());
        assert!(record.instant.is_none());
        assert!(record.casual.is_none());
        assert_eq!(record.raw_record().cnt, 16.0);
    }
}
