//! Search grid generation.
//!
//! Tiles a bounding box with search origins spaced so that neighbouring
//! search circles overlap. Distances are converted with a flat-earth
//! ratio (one degree ≈ 111,111 m) on both axes. That is good enough at
//! county scale; longitude degrees shrink with latitude and this is not
//! corrected, so circles overlap less in the east-west direction than the
//! nominal spacing suggests.

use coffee_map_places_models::{BoundingBox, GridPoint};

/// Approximate number of meters in one degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_111.0;

/// Lattice spacing as a multiple of the search radius. Anything below
/// `2.0` makes adjacent circles overlap.
pub const OVERLAP_FACTOR: f64 = 1.5;

/// Converts a radius in meters to the approximate equivalent in degrees.
#[must_use]
pub fn radius_degrees(radius_meters: f64) -> f64 {
    radius_meters / METERS_PER_DEGREE
}

/// Distance in degrees between neighbouring grid points for a radius.
///
/// At `1.5 r` the centre of a lattice cell is about `1.06 r` from its
/// corners, so small gaps remain between four neighbouring circles.
#[must_use]
pub fn spacing_degrees(radius_meters: f64) -> f64 {
    radius_degrees(radius_meters) * OVERLAP_FACTOR
}

/// Generates the search lattice for `bounds`.
///
/// Points are laid out at [`spacing_degrees`] intervals over
/// `[min_lon, max_lon) x [min_lat, max_lat)`, starting at the south-west
/// corner. Ordering is deterministic (longitude-major, then latitude) and
/// only matters for progress reporting.
///
/// Returns an empty grid for a non-positive radius or a degenerate box.
#[must_use]
pub fn generate(bounds: &BoundingBox, radius_meters: f64) -> Vec<GridPoint> {
    if radius_meters <= 0.0 || !radius_meters.is_finite() || bounds.is_degenerate() {
        return Vec::new();
    }

    let step = spacing_degrees(radius_meters);
    let lons = axis(bounds.min_lon, bounds.max_lon, step);
    let lats = axis(bounds.min_lat, bounds.max_lat, step);

    let mut points = Vec::with_capacity(lons.len() * lats.len());
    for &lon in &lons {
        for &lat in &lats {
            points.push(GridPoint::new(lat, lon));
        }
    }

    log::debug!(
        "Generated {} grid points ({} x {}) at {step:.5} degree spacing",
        points.len(),
        lons.len(),
        lats.len()
    );

    points
}

/// Half-open range `start, start + step, ...` strictly below `stop`.
///
/// Each value is computed from its index rather than by accumulation so
/// rounding error does not drift across long axes.
fn axis(start: f64, stop: f64, step: f64) -> Vec<f64> {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let count = ((stop - start) / step).ceil() as usize;

    (0..count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let index = i as f64;
            index.mul_add(step, start)
        })
        .filter(|value| *value < stop)
        .collect()
}
