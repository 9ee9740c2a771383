#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tract-level aggregate and scoring types.
//!
//! A [`RegionAggregate`] exists for every tract in the study area,
//! including tracts with no coffee shops at all. Those empty tracts are
//! the signal the hotspot and opportunity scores look for.

use coffee_map_geography_models::Demographics;
use serde::{Deserialize, Serialize};

/// Coffee shop statistics for one tract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionAggregate {
    /// Tract GEOID.
    pub geoid: String,
    /// Number of distinct places inside the tract.
    pub shop_count: u64,
    /// Mean rating over rated places; `0` when none are rated.
    pub avg_rating: f64,
    /// Sum of review counts over places that report one.
    pub total_reviews: u64,
    /// Bayesian-shrinkage rating; `0` until weighted and for empty tracts.
    pub weighted_avg_rating: f64,
}

impl RegionAggregate {
    /// An aggregate for a tract with no matched places.
    #[must_use]
    pub fn empty(geoid: &str) -> Self {
        Self {
            geoid: geoid.to_string(),
            shop_count: 0,
            avg_rating: 0.0,
            total_reviews: 0,
            weighted_avg_rating: 0.0,
        }
    }
}

/// A tract's aggregate joined with its demographics. One row of the
/// region artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSummary {
    /// Shop statistics.
    pub aggregate: RegionAggregate,
    /// ACS estimates.
    pub demographics: Demographics,
}

/// Survey-wide rating statistics used as the shrinkage prior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalRatingStats {
    /// Mean rating over every rated place (`C`).
    pub mean_rating: Option<f64>,
    /// 75th-percentile review count over places reporting one (`m`).
    pub review_threshold: Option<f64>,
    /// Number of places the statistics were computed from.
    pub place_count: u64,
}

/// Percentile levels for the threshold hotspot rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotCriteria {
    /// Quantile of tract population a hotspot must reach (0..=1).
    pub population_quantile: f64,
    /// Quantile of tract median income a hotspot must reach (0..=1).
    pub income_quantile: f64,
}

impl Default for HotspotCriteria {
    fn default() -> Self {
        Self {
            population_quantile: 0.75,
            income_quantile: 0.75,
        }
    }
}

/// Result of one threshold scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotReport {
    /// Population cut-off; `None` if no tract reported population.
    pub population_threshold: Option<f64>,
    /// Income cut-off; `None` if no tract reported income.
    pub income_threshold: Option<f64>,
    /// Matching tracts, most populous first.
    pub hotspots: Vec<RegionSummary>,
}

/// Demographic features handed to an external demand model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFeatures {
    /// Total population.
    pub population: f64,
    /// Median household income.
    pub median_income: f64,
    /// Median age.
    pub median_age: f64,
}

/// One training/prediction row for an external demand model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInput {
    /// Tract GEOID.
    pub geoid: String,
    /// Model features.
    pub features: ModelFeatures,
    /// Observed shop count (the model's target).
    pub shop_count: u64,
}

/// Gap between predicted and observed shop counts for one tract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityScore {
    /// Tract GEOID.
    pub geoid: String,
    /// Shop count the external model predicts.
    pub predicted: f64,
    /// Shop count actually observed.
    pub shop_count: u64,
    /// `predicted - shop_count`; positive means under-served.
    pub score: f64,
}
