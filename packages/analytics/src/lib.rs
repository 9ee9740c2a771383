#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tract-level aggregation and scoring of surveyed places.
//!
//! The stages run in order:
//!
//! 1. [`aggregate`] attributes each place to the tract containing it and
//!    rolls up counts, ratings and reviews per tract (left join: every
//!    tract gets a row).
//! 2. [`rating`] computes survey-wide rating statistics and the
//!    shrinkage-weighted rating per tract.
//! 3. [`hotspot`] flags populous, affluent tracts with no shops, and
//!    merges externally predicted demand into opportunity scores.
//!
//! [`export`] reads and writes the stage artifacts; [`stats`] holds the
//! descriptive statistics the stages share.

pub mod aggregate;
pub mod export;
pub mod hotspot;
pub mod rating;
pub mod stats;

/// Errors that can occur while reading or writing analysis artifacts.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// An artifact did not match the expected schema.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
