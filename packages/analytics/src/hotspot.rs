//! Under-served tract detection.
//!
//! Two modes: a threshold rule over demographics and shop counts, and a
//! merge of externally predicted shop counts into opportunity scores.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use coffee_map_analytics_models::{
    HotspotCriteria, HotspotReport, ModelFeatures, ModelInput, OpportunityScore, RegionSummary,
};

use crate::stats::quantile;

/// Flags tracts that are populous, affluent and have no shops.
///
/// Thresholds are the configured quantiles of population and median
/// income over `summaries` itself, so callers must pass the full region
/// set. A tract with a missing population or income never qualifies.
/// Hotspots are ordered by descending population.
#[must_use]
pub fn score_threshold(summaries: &[RegionSummary], criteria: HotspotCriteria) -> HotspotReport {
    let population_threshold = quantile(
        summaries.iter().filter_map(|s| s.demographics.population),
        criteria.population_quantile,
    );
    let income_threshold = quantile(
        summaries.iter().filter_map(|s| s.demographics.median_income),
        criteria.income_quantile,
    );

    let mut hotspots: Vec<RegionSummary> = match (population_threshold, income_threshold) {
        (Some(min_population), Some(min_income)) => summaries
            .iter()
            .filter(|s| s.aggregate.shop_count == 0)
            .filter(|s| at_least(s.demographics.population, min_population))
            .filter(|s| at_least(s.demographics.median_income, min_income))
            .cloned()
            .collect(),
        _ => {
            log::warn!("No demographic data to derive hotspot thresholds from");
            Vec::new()
        }
    };

    hotspots.sort_by(|a, b| {
        descending(a.demographics.population, b.demographics.population)
            .then_with(|| a.aggregate.geoid.cmp(&b.aggregate.geoid))
    });

    log::info!(
        "{} hotspots (population >= {population_threshold:?}, income >= {income_threshold:?})",
        hotspots.len()
    );

    HotspotReport {
        population_threshold,
        income_threshold,
        hotspots,
    }
}

fn at_least(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v >= threshold)
}

fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Model input rows for every tract with complete demographics.
#[must_use]
pub fn model_inputs(summaries: &[RegionSummary]) -> Vec<ModelInput> {
    summaries
        .iter()
        .filter_map(|s| {
            let d = &s.demographics;
            Some(ModelInput {
                geoid: s.aggregate.geoid.clone(),
                features: ModelFeatures {
                    population: d.population?,
                    median_income: d.median_income?,
                    median_age: d.median_age?,
                },
                shop_count: s.aggregate.shop_count,
            })
        })
        .collect()
}

/// Merges predicted shop counts into opportunity scores
/// (`predicted - shop_count`), highest first.
///
/// Tracts without a prediction are omitted; predictions for unknown
/// tracts are ignored.
#[must_use]
pub fn opportunity_scores(
    summaries: &[RegionSummary],
    predictions: &BTreeMap<String, f64>,
) -> Vec<OpportunityScore> {
    let mut scores: Vec<OpportunityScore> = summaries
        .iter()
        .filter_map(|s| {
            let predicted = *predictions.get(&s.aggregate.geoid)?;
            #[allow(clippy::cast_precision_loss)]
            let observed = s.aggregate.shop_count as f64;
            Some(OpportunityScore {
                geoid: s.aggregate.geoid.clone(),
                predicted,
                shop_count: s.aggregate.shop_count,
                score: predicted - observed,
            })
        })
        .collect();

    let unmatched = predictions.len().saturating_sub(scores.len());
    if unmatched > 0 {
        log::warn!("{unmatched} predictions did not match any region");
    }

    scores.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.geoid.cmp(&b.geoid)));
    scores
}
