//! Feature engineering and demand prediction

mod features;
mod inference;
mod output;

pub use features::{
    engineered_columns, is_rush_hour, FeatureEngineer, FeatureRow, FeatureSchema,
    DERIVED_COLUMNS, DROP_COLUMNS, NUM_FEATURES, RUSH_HOURS, SEASON_LABELS, WEATHER_LABELS,
    WEEKDAY_LABELS,
};
pub use inference::{predict, DemandPredictor, FeatureImportance, InferenceStats};
pub use output::{clip_non_negative, round1, PredictionOutcome, MIN_ERROR_DENOMINATOR};
