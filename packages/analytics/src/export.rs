//! Analysis artifacts.
//!
//! The region `GeoJSON` carries one feature per tract (boundary plus shop
//! statistics and demographics) and is the hand-off between the `analyze`
//! stage and the scoring stages. The CSVs are the scoring outputs and the
//! model hand-off in both directions.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use coffee_map_analytics_models::{ModelInput, OpportunityScore, RegionAggregate, RegionSummary};
use coffee_map_geography::Region;
use coffee_map_geography_models::Demographics;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde::{Deserialize, Serialize};

use crate::AnalyticsError;

/// Version of the region artifact layout written by this crate.
pub const REGION_SCHEMA_VERSION: u64 = 1;

const SCHEMA_VERSION_MEMBER: &str = "schema_version";

/// Writes the region artifact: one feature per region, with the matching
/// summary's statistics as properties.
///
/// `summaries` must be in the same order as `regions`.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the two lists do not line up or the file
/// cannot be written.
pub fn write_regions_geojson(
    path: &Path,
    regions: &[Region],
    summaries: &[RegionSummary],
) -> Result<usize, AnalyticsError> {
    if regions.len() != summaries.len() {
        return Err(AnalyticsError::Conversion {
            message: format!(
                "{} regions but {} summaries",
                regions.len(),
                summaries.len()
            ),
        });
    }

    let mut features = Vec::with_capacity(regions.len());
    for (region, summary) in regions.iter().zip(summaries) {
        if region.geoid != summary.aggregate.geoid {
            return Err(AnalyticsError::Conversion {
                message: format!(
                    "Region {} paired with summary for {}",
                    region.geoid, summary.aggregate.geoid
                ),
            });
        }

        features.push(Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(
                &region.boundary,
            ))),
            id: None,
            properties: Some(summary_properties(summary)),
            foreign_members: None,
        });
    }

    let mut foreign_members = JsonObject::new();
    foreign_members.insert(
        SCHEMA_VERSION_MEMBER.to_string(),
        REGION_SCHEMA_VERSION.into(),
    );

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    };

    create_parent(path)?;
    let file = std::io::BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer(file, &collection)?;

    log::info!(
        "Wrote {} regions to {}",
        collection.features.len(),
        path.display()
    );
    Ok(collection.features.len())
}

fn summary_properties(summary: &RegionSummary) -> JsonObject {
    let a = &summary.aggregate;
    let d = &summary.demographics;

    let mut properties = JsonObject::new();
    properties.insert("GEOID".to_string(), a.geoid.clone().into());
    properties.insert("ShopCount".to_string(), a.shop_count.into());
    properties.insert("AvgRating".to_string(), a.avg_rating.into());
    properties.insert("TotalReviews".to_string(), a.total_reviews.into());
    properties.insert(
        "WeightedAvgRating".to_string(),
        a.weighted_avg_rating.into(),
    );
    properties.insert("TotalPopulation".to_string(), d.population.into());
    properties.insert(
        "MedianHouseholdIncome".to_string(),
        d.median_income.into(),
    );
    properties.insert("MedianAge".to_string(), d.median_age.into());
    properties
}

/// Reads region summaries back from the region artifact. Geometry is
/// ignored.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the file cannot be read, declares an
/// unsupported schema version, or a feature lacks a required property.
pub fn read_region_summaries(path: &Path) -> Result<Vec<RegionSummary>, AnalyticsError> {
    let text = fs::read_to_string(path)?;
    let summaries = parse_region_summaries(&text)?;

    log::info!(
        "Read {} region summaries from {}",
        summaries.len(),
        path.display()
    );
    Ok(summaries)
}

/// Parses the region artifact. See [`read_region_summaries`].
///
/// # Errors
///
/// Returns [`AnalyticsError`] on malformed or unsupported input.
pub fn parse_region_summaries(text: &str) -> Result<Vec<RegionSummary>, AnalyticsError> {
    let GeoJson::FeatureCollection(collection) = text.parse::<GeoJson>()? else {
        return Err(AnalyticsError::Conversion {
            message: "Region artifact is not a GeoJSON FeatureCollection".to_string(),
        });
    };

    let version = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get(SCHEMA_VERSION_MEMBER));
    match version.map(serde_json::Value::as_u64) {
        Some(Some(REGION_SCHEMA_VERSION)) => {}
        None => log::warn!("Region artifact has no schema version, assuming {REGION_SCHEMA_VERSION}"),
        Some(_) => {
            return Err(AnalyticsError::Conversion {
                message: format!("Unsupported region schema version {version:?}"),
            });
        }
    }

    collection
        .features
        .iter()
        .map(feature_summary)
        .collect()
}

fn feature_summary(feature: &Feature) -> Result<RegionSummary, AnalyticsError> {
    let geoid = match feature.property("GEOID") {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        _ => {
            return Err(AnalyticsError::Conversion {
                message: "Region feature without a GEOID".to_string(),
            });
        }
    };

    let required = |name: &str| {
        optional_number(feature, name).ok_or_else(|| AnalyticsError::Conversion {
            message: format!("Region {geoid} is missing {name}"),
        })
    };

    let shop_count = count(required("ShopCount")?);
    let avg_rating = required("AvgRating")?;
    let total_reviews = count(required("TotalReviews")?);
    let weighted_avg_rating = required("WeightedAvgRating")?;

    Ok(RegionSummary {
        aggregate: RegionAggregate {
            geoid,
            shop_count,
            avg_rating,
            total_reviews,
            weighted_avg_rating,
        },
        demographics: Demographics {
            population: optional_number(feature, "TotalPopulation"),
            median_income: optional_number(feature, "MedianHouseholdIncome"),
            median_age: optional_number(feature, "MedianAge"),
        },
    })
}

fn optional_number(feature: &Feature, name: &str) -> Option<f64> {
    feature
        .property(name)
        .and_then(serde_json::Value::as_f64)
        .filter(|v| v.is_finite())
}

/// Counts may have been written as floats by other tools.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count(value: f64) -> u64 {
    value.max(0.0).round() as u64
}

#[derive(Debug, Serialize)]
struct HotspotRow<'a> {
    #[serde(rename = "GEOID")]
    geoid: &'a str,
    #[serde(rename = "TotalPopulation")]
    population: Option<f64>,
    #[serde(rename = "MedianHouseholdIncome")]
    median_income: Option<f64>,
    #[serde(rename = "MedianAge")]
    median_age: Option<f64>,
    #[serde(rename = "ShopCount")]
    shop_count: u64,
}

/// Writes hotspot rows in the order given.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the file cannot be written.
pub fn write_hotspots_csv(path: &Path, hotspots: &[RegionSummary]) -> Result<(), AnalyticsError> {
    write_rows(
        path,
        hotspots.iter().map(|s| HotspotRow {
            geoid: &s.aggregate.geoid,
            population: s.demographics.population,
            median_income: s.demographics.median_income,
            median_age: s.demographics.median_age,
            shop_count: s.aggregate.shop_count,
        }),
    )?;

    log::info!("Wrote {} hotspots to {}", hotspots.len(), path.display());
    Ok(())
}

/// Writes model input rows (same columns as the hotspot CSV).
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the file cannot be written.
pub fn write_model_inputs_csv(path: &Path, inputs: &[ModelInput]) -> Result<(), AnalyticsError> {
    write_rows(
        path,
        inputs.iter().map(|input| HotspotRow {
            geoid: &input.geoid,
            population: Some(input.features.population),
            median_income: Some(input.features.median_income),
            median_age: Some(input.features.median_age),
            shop_count: input.shop_count,
        }),
    )?;

    log::info!("Wrote {} model inputs to {}", inputs.len(), path.display());
    Ok(())
}

#[derive(Debug, Deserialize)]
struct PredictionRow {
    #[serde(rename = "GEOID")]
    geoid: String,
    #[serde(rename = "Predicted")]
    predicted: f64,
}

/// Reads a `GEOID,Predicted` CSV produced by an external model. Later
/// rows win on duplicate GEOIDs.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the file cannot be read or a row is
/// malformed.
pub fn read_predictions_csv(path: &Path) -> Result<BTreeMap<String, f64>, AnalyticsError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut predictions = BTreeMap::new();

    for row in reader.deserialize::<PredictionRow>() {
        let row = row?;
        predictions.insert(row.geoid.trim().to_string(), row.predicted);
    }

    log::info!(
        "Read {} predictions from {}",
        predictions.len(),
        path.display()
    );
    Ok(predictions)
}

#[derive(Debug, Serialize)]
struct OpportunityRow<'a> {
    #[serde(rename = "GEOID")]
    geoid: &'a str,
    #[serde(rename = "Predicted")]
    predicted: f64,
    #[serde(rename = "ShopCount")]
    shop_count: u64,
    #[serde(rename = "OpportunityScore")]
    score: f64,
}

/// Writes opportunity scores in the order given.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the file cannot be written.
pub fn write_opportunity_csv(
    path: &Path,
    scores: &[OpportunityScore],
) -> Result<(), AnalyticsError> {
    write_rows(
        path,
        scores.iter().map(|s| OpportunityRow {
            geoid: &s.geoid,
            predicted: s.predicted,
            shop_count: s.shop_count,
            score: s.score,
        }),
    )?;

    log::info!(
        "Wrote {} opportunity scores to {}",
        scores.len(),
        path.display()
    );
    Ok(())
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), AnalyticsError> {
    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<(), AnalyticsError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use geo::{MultiPolygon, polygon};

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("coffee_map_export_{}", std::process::id()))
            .join(name)
    }

    fn region(geoid: &str, x0: f64) -> Region {
        Region {
            geoid: geoid.to_string(),
            boundary: MultiPolygon(vec![polygon![
                (x: x0, y: 0.0),
                (x: x0 + 1.0, y: 0.0),
                (x: x0 + 1.0, y: 1.0),
                (x: x0, y: 0.0),
            ]]),
            demographics: Demographics::default(),
        }
    }

    fn summaries() -> Vec<RegionSummary> {
        vec![
            RegionSummary {
                aggregate: RegionAggregate {
                    geoid: "06065000100".to_string(),
                    shop_count: 2,
                    avg_rating: 4.5,
                    total_reviews: 15,
                    weighted_avg_rating: 4.5,
                },
                demographics: Demographics {
                    population: Some(50_000.0),
                    median_income: Some(90_000.0),
                    median_age: Some(37.5),
                },
            },
            RegionSummary {
                aggregate: RegionAggregate::empty("06065000200"),
                demographics: Demographics {
                    population: Some(5_000.0),
                    median_income: None,
                    median_age: None,
                },
            },
        ]
    }

    #[test]
    fn region_artifact_reads_back() {
        let path = temp_path("regions.geojson");
        let regions = vec![region("06065000100", 0.0), region("06065000200", 1.0)];

        let written = write_regions_geojson(&path, &regions, &summaries()).unwrap();
        assert_eq!(written, 2);

        let text = fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["features"][1]["properties"]["ShopCount"], 0);
        assert!(json["features"][1]["properties"]["MedianAge"].is_null());

        assert_eq!(read_region_summaries(&path).unwrap(), summaries());
    }

    #[test]
    fn mismatched_regions_are_rejected() {
        let path = temp_path("mismatched.geojson");
        let regions = vec![region("06065000200", 0.0), region("06065000100", 1.0)];

        assert!(matches!(
            write_regions_geojson(&path, &regions, &summaries()),
            Err(AnalyticsError::Conversion { .. })
        ));
        assert!(write_regions_geojson(&path, &regions[..1], &summaries()).is_err());
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let text = serde_json::json!({
            "type": "FeatureCollection",
            "features": [],
            "schema_version": 2
        })
        .to_string();

        assert!(matches!(
            parse_region_summaries(&text),
            Err(AnalyticsError::Conversion { .. })
        ));
    }

    #[test]
    fn float_counts_and_missing_version_are_accepted() {
        let text = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": null,
                "properties": {
                    "GEOID": "06065000300",
                    "ShopCount": 3.0,
                    "AvgRating": 4.1,
                    "TotalReviews": 120.0,
                    "WeightedAvgRating": 4.05,
                    "TotalPopulation": null
                }
            }]
        })
        .to_string();

        let summaries = parse_region_summaries(&text).unwrap();

        assert_eq!(summaries[0].aggregate.shop_count, 3);
        assert_eq!(summaries[0].aggregate.total_reviews, 120);
        assert_eq!(summaries[0].demographics.population, None);
    }

    #[test]
    fn missing_required_property_is_an_error() {
        let text = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": null,
                "properties": { "GEOID": "06065000300" }
            }]
        })
        .to_string();

        assert!(parse_region_summaries(&text).is_err());
    }

    #[test]
    fn hotspot_csv_has_expected_columns() {
        let path = temp_path("hotspots.csv");
        write_hotspots_csv(&path, &summaries()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("GEOID,TotalPopulation,MedianHouseholdIncome,MedianAge,ShopCount")
        );
        assert_eq!(lines.next(), Some("06065000100,50000.0,90000.0,37.5,2"));
        assert_eq!(lines.next(), Some("06065000200,5000.0,,,0"));
    }

    #[test]
    fn predictions_feed_opportunity_csv() {
        let predictions_path = temp_path("predictions.csv");
        fs::create_dir_all(predictions_path.parent().unwrap()).unwrap();
        fs::write(
            &predictions_path,
            "GEOID,Predicted\n06065000100,3.5\n06065000200,1.0\n",
        )
        .unwrap();

        let predictions = read_predictions_csv(&predictions_path).unwrap();
        assert_eq!(predictions.get("06065000100"), Some(&3.5));

        let scores = crate::hotspot::opportunity_scores(&summaries(), &predictions);
        let path = temp_path("opportunity.csv");
        write_opportunity_csv(&path, &scores).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "GEOID,Predicted,ShopCount,OpportunityScore");
        assert_eq!(lines[1], "06065000100,3.5,2,1.5");
        assert_eq!(lines[2], "06065000200,1.0,0,1.0");
    }

    #[test]
    fn model_inputs_csv_lists_complete_rows() {
        let path = temp_path("model_inputs.csv");
        let inputs = crate::hotspot::model_inputs(&summaries());
        write_model_inputs_csv(&path, &inputs).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
