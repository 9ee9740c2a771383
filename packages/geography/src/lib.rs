#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Census tract reference data for the survey.
//!
//! Tract polygons are read from a `GeoJSON` file (optionally downloaded
//! first from the Census Bureau `TIGERweb` service), demographic estimates
//! are fetched from the ACS API, and the two are joined by GEOID into the
//! [`Region`] records that aggregation runs against.
//!
//! All geometry is WGS84 longitude/latitude, the same frame the places
//! provider reports coordinates in.

pub mod boundaries;
pub mod census;
pub mod tigerweb;

use coffee_map_geography_models::Demographics;
use geo::MultiPolygon;
use thiserror::Error;

/// Errors that can occur while loading or fetching tract data.
#[derive(Debug, Error)]
pub enum GeoError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A tract boundary page could not be downloaded.
    #[error("Tract download for county {county} failed at offset {offset} after {attempts} attempts: {reason}")]
    TractDownload {
        /// State and county FIPS codes, concatenated.
        county: String,
        /// `resultOffset` of the failing page.
        offset: u32,
        /// Requests made for the page.
        attempts: u32,
        /// Failure of the last attempt.
        reason: String,
    },

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// A census tract polygon as read from the boundary file.
#[derive(Debug, Clone, PartialEq)]
pub struct TractBoundary {
    /// 11-character tract GEOID.
    pub geoid: String,
    /// Tract outline in WGS84 longitude/latitude.
    pub boundary: MultiPolygon<f64>,
}

/// A tract with its boundary and demographics: the unit of aggregation.
///
/// Read-only reference data for every stage after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// 11-character tract GEOID.
    pub geoid: String,
    /// Tract outline in WGS84 longitude/latitude.
    pub boundary: MultiPolygon<f64>,
    /// ACS estimates; all-missing when the tract had no demographic row.
    pub demographics: Demographics,
}
