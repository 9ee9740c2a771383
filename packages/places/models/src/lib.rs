#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Search grid and point-of-interest types.
//!
//! These types describe the raw output of a survey run: the synthetic
//! search origins that tile the study area and the unique places the
//! search provider returned for them.

use serde::{Deserialize, Serialize};

/// A synthetic search origin used to tile an area for exhaustive
/// point-radius search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    /// Latitude in decimal degrees (WGS84).
    pub latitude: f64,
    /// Longitude in decimal degrees (WGS84).
    pub longitude: f64,
}

impl GridPoint {
    /// Creates a grid point from a latitude/longitude pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Formats the point as the `"{lat},{lon}"` string the search provider
    /// expects for its `location` parameter.
    #[must_use]
    pub fn location_param(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

/// Axis-aligned envelope of the study area in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western edge.
    pub min_lon: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl BoundingBox {
    /// Creates a bounding box from `(min_lon, min_lat, max_lon, max_lat)`.
    #[must_use]
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Returns `true` when the box has no area along at least one axis
    /// (or contains non-finite edges).
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !(self.min_lon < self.max_lon && self.min_lat < self.max_lat)
    }
}

/// A single point of interest returned by the search provider.
///
/// Identity is the provider-assigned [`Place::id`]: two records with the
/// same id describe the same real-world place, whatever their other
/// fields say.
///
/// Field names serialize to the columns of the places CSV artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Stable provider identifier (`place_id`).
    #[serde(rename = "place_id")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short address (the provider's `vicinity`).
    pub address: Option<String>,
    /// Latitude in decimal degrees (WGS84).
    pub latitude: f64,
    /// Longitude in decimal degrees (WGS84).
    pub longitude: f64,
    /// Average star rating, when the place has been rated.
    pub rating: Option<f64>,
    /// Number of user ratings behind [`Place::rating`].
    pub review_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_param_is_lat_then_lon() {
        let point = GridPoint::new(33.95, -117.39);
        assert_eq!(point.location_param(), "33.95,-117.39");
    }

    #[test]
    fn degenerate_boxes() {
        assert!(BoundingBox::new(1.0, 0.0, 1.0, 1.0).is_degenerate());
        assert!(BoundingBox::new(2.0, 0.0, 1.0, 1.0).is_degenerate());
        assert!(BoundingBox::new(0.0, 1.0, 1.0, 1.0).is_degenerate());
        assert!(BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).is_degenerate());
        assert!(!BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_degenerate());
    }
}
