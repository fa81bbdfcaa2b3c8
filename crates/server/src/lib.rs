//! HTTP serving layer for the bike demand predictor

pub mod api;
pub mod config;
pub mod startup;
