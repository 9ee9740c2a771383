//! Tract boundary loading and assembly.

use std::collections::BTreeMap;
use std::path::Path;

use coffee_map_geography_models::TractDemographics;
use coffee_map_geography_models::fips::{county_of, is_tract_geoid};
use coffee_map_places_models::BoundingBox;
use geo::{BoundingRect, MultiPolygon};
use geojson::{Feature, GeoJson};

use crate::{GeoError, Region, TractBoundary};

/// Property names that may carry the county code, in order of preference.
/// TIGER/Line shapefile exports use `COUNTYFP`; `TIGERweb` uses `COUNTY`.
const COUNTY_PROPERTIES: &[&str] = &["COUNTYFP", "COUNTY"];

/// Loads tract polygons from a `GeoJSON` `FeatureCollection`.
///
/// When `county_fips` is given, features from other counties are dropped.
/// The county comes from the feature's county property, else from its
/// `GEOID`; features with neither are kept. Features with no `GEOID` or a
/// non-polygonal geometry are skipped with a warning.
///
/// # Errors
///
/// Returns [`GeoError`] if the file cannot be read, is not a
/// `FeatureCollection`, or yields no usable tracts.
pub fn load_tract_boundaries(
    path: &Path,
    county_fips: Option<&str>,
) -> Result<Vec<TractBoundary>, GeoError> {
    let text = std::fs::read_to_string(path)?;
    let boundaries = parse_tract_boundaries(&text, county_fips)?;

    if boundaries.is_empty() {
        return Err(GeoError::Conversion {
            message: format!("No usable tract boundaries in {}", path.display()),
        });
    }

    log::info!(
        "Loaded {} tract boundaries from {}",
        boundaries.len(),
        path.display()
    );
    Ok(boundaries)
}

/// Parses tract polygons from `GeoJSON` text. See
/// [`load_tract_boundaries`].
///
/// # Errors
///
/// Returns [`GeoError`] if the text is not a `GeoJSON` `FeatureCollection`.
pub fn parse_tract_boundaries(
    text: &str,
    county_fips: Option<&str>,
) -> Result<Vec<TractBoundary>, GeoError> {
    let GeoJson::FeatureCollection(collection) = text.parse::<GeoJson>()? else {
        return Err(GeoError::Conversion {
            message: "Boundary file is not a GeoJSON FeatureCollection".to_string(),
        });
    };

    let mut boundaries = Vec::with_capacity(collection.features.len());
    let mut skipped = 0u64;
    let mut nonstandard = 0u64;

    for feature in collection.features {
        let Some(geoid) = string_property(&feature, &["GEOID"]) else {
            skipped += 1;
            continue;
        };

        if let Some(county) = county_fips {
            let feature_county = string_property(&feature, COUNTY_PROPERTIES)
                .or_else(|| county_of(&geoid).map(str::to_string));
            if feature_county.is_some_and(|c| c != county) {
                continue;
            }
        }

        if !is_tract_geoid(&geoid) {
            nonstandard += 1;
        }

        let Some(boundary) = feature_multipolygon(feature) else {
            log::warn!("Tract {geoid} has no polygon geometry, skipping");
            skipped += 1;
            continue;
        };

        boundaries.push(TractBoundary { geoid, boundary });
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} boundary features without a GEOID or polygon");
    }
    if nonstandard > 0 {
        log::warn!("{nonstandard} tracts have non-standard GEOIDs and will not match ACS rows");
    }

    Ok(boundaries)
}

/// Reads the first present property among `names` as a trimmed string.
/// Numeric properties are rendered without a fractional part.
fn string_property(feature: &Feature, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match feature.property(name)? {
        serde_json::Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Converts a feature's geometry to a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn feature_multipolygon(feature: Feature) -> Option<MultiPolygon<f64>> {
    let geometry: geo::Geometry<f64> = feature.geometry?.try_into().ok()?;
    match geometry {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Left-joins demographic rows onto tract boundaries by GEOID.
///
/// Every boundary yields exactly one [`Region`], in input order. Tracts
/// without a demographic row keep all-missing demographics.
#[must_use]
pub fn attach_demographics(
    boundaries: Vec<TractBoundary>,
    demographics: &[TractDemographics],
) -> Vec<Region> {
    let by_geoid: BTreeMap<&str, _> = demographics
        .iter()
        .map(|row| (row.geoid.as_str(), row.demographics))
        .collect();

    let mut unmatched = 0u64;
    let regions: Vec<Region> = boundaries
        .into_iter()
        .map(|tract| {
            let demographics = by_geoid.get(tract.geoid.as_str()).copied();
            if demographics.is_none() {
                unmatched += 1;
            }
            Region {
                geoid: tract.geoid,
                boundary: tract.boundary,
                demographics: demographics.unwrap_or_default(),
            }
        })
        .collect();

    if unmatched > 0 {
        log::warn!("{unmatched} tracts have no demographic estimates");
    }

    regions
}

/// Envelope of every boundary, or `None` if there is none.
#[must_use]
pub fn total_bounds<'a>(
    boundaries: impl IntoIterator<Item = &'a MultiPolygon<f64>>,
) -> Option<BoundingBox> {
    boundaries
        .into_iter()
        .filter_map(BoundingRect::bounding_rect)
        .fold(None, |acc: Option<BoundingBox>, rect| {
            let (min, max) = (rect.min(), rect.max());
            Some(acc.map_or_else(
                || BoundingBox::new(min.x, min.y, max.x, max.y),
                |b| {
                    BoundingBox::new(
                        b.min_lon.min(min.x),
                        b.min_lat.min(min.y),
                        b.max_lon.max(max.x),
                        b.max_lat.max(max.y),
                    )
                },
            ))
        })
}
