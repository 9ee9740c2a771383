//! Survey pipeline stages.
//!
//! Each stage reads the previous stage's artifact from disk and writes its
//! own, so stages can be re-run independently:
//!
//! tracts -> collect -> analyze -> hotspots / features -> opportunity

use std::error::Error;
use std::path::Path;
use std::time::Instant;

use coffee_map_analytics::aggregate::{aggregate, summarize};
use coffee_map_analytics::export::{
    read_predictions_csv, read_region_summaries, write_hotspots_csv, write_model_inputs_csv,
    write_opportunity_csv, write_regions_geojson,
};
use coffee_map_analytics::hotspot::{model_inputs, opportunity_scores, score_threshold};
use coffee_map_analytics::rating::{global_stats, weight};
use coffee_map_analytics::stats::correlation_matrix;
use coffee_map_analytics_models::{HotspotCriteria, HotspotReport, OpportunityScore};
use coffee_map_cli_utils::{MultiProgress, SurveyProgress};
use coffee_map_geography::boundaries::{attach_demographics, load_tract_boundaries, total_bounds};
use coffee_map_geography::{census, tigerweb};
use coffee_map_places::collector::{CollectionStats, PlaceCollector};
use coffee_map_places::google::GooglePlacesClient;
use coffee_map_places::grid;
use coffee_map_places::store::{read_places_csv, write_places_csv};

use crate::config::{self, SurveyConfig};

/// Downloads the configured county's tract boundaries to
/// `region.boundary_path`.
///
/// # Errors
///
/// Returns an error if the download fails or the file cannot be written.
pub async fn download_tracts(config: &SurveyConfig) -> Result<usize, Box<dyn Error>> {
    let client = tigerweb::build_client()?;
    let count = tigerweb::download_county_tracts(
        &client,
        &config.region.state_fips,
        &config.region.county_fips,
        &config.region.boundary_path,
    )
    .await?;
    Ok(count)
}

/// Tiles the study area, surveys every grid point and writes the unique
/// places CSV.
///
/// # Errors
///
/// Returns an error if the API key is missing, the boundary file is
/// unusable, or the places CSV cannot be written. Failed search requests
/// are not errors.
pub async fn collect(
    config: &SurveyConfig,
    multi: &MultiProgress,
) -> Result<CollectionStats, Box<dyn Error>> {
    let api_key = config::places_api_key()?;
    let tracts = load_tract_boundaries(
        &config.region.boundary_path,
        Some(&config.region.county_fips),
    )?;

    let bounds = total_bounds(tracts.iter().map(|t| &t.boundary))
        .ok_or("Tract boundaries have no spatial extent")?;
    let points = grid::generate(&bounds, config.search.radius_meters);
    log::info!(
        "Surveying {} grid points at {} m radius for type {:?}",
        points.len(),
        config.search.radius_meters,
        config.search.place_type
    );

    let client = GooglePlacesClient::new(
        &api_key,
        &config.search.base_url,
        config.search.timeout(),
    )?;
    let collector = PlaceCollector::new(
        client,
        config.search.radius_meters,
        &config.search.place_type,
    );

    let progress = SurveyProgress::grid_points(multi, "Collecting places");
    let (registry, stats) = collector.collect(&points, &progress).await;

    log::info!(
        "{} duplicate observations absorbed by the registry",
        stats.observations.saturating_sub(registry.len() as u64)
    );

    write_places_csv(&config.output.places_path, registry.iter())?;
    Ok(stats)
}

/// Joins the places CSV onto tracts and demographics, weights ratings and
/// writes the region `GeoJSON`.
///
/// # Errors
///
/// Returns an error if any input is unreadable, the demographics fetch
/// fails, or the region artifact cannot be written.
pub async fn analyze(config: &SurveyConfig) -> Result<(), Box<dyn Error>> {
    let tracts = load_tract_boundaries(
        &config.region.boundary_path,
        Some(&config.region.county_fips),
    )?;

    let client = reqwest::Client::builder()
        .timeout(config.search.timeout())
        .build()?;
    let demographics = census::fetch_tract_demographics(
        &client,
        config.census.year,
        &config.region.state_fips,
        &config.region.county_fips,
        config::census_api_key().as_deref(),
    )
    .await?;
    let regions = attach_demographics(tracts, &demographics);

    let places = read_places_csv(&config.output.places_path)?;

    let stats = global_stats(&places);
    log::info!(
        "Global rating prior over {} places: mean rating C = {}, review threshold m = {}",
        stats.place_count,
        format_optional(stats.mean_rating),
        format_optional(stats.review_threshold)
    );

    let mut join = aggregate(&places, &regions);
    weight(&mut join.aggregates, &stats);
    let summaries = summarize(&join.aggregates, &regions);

    log::info!(
        "Correlations across {} tracts:\n{}",
        summaries.len(),
        correlation_matrix(&summaries).render()
    );

    write_regions_geojson(&config.output.regions_path, &regions, &summaries)?;
    Ok(())
}

/// Applies the threshold rule to the region artifact, prints the top
/// `top` hotspots and writes all of them to the hotspots CSV.
///
/// # Errors
///
/// Returns an error if the region artifact is unreadable or the CSV
/// cannot be written.
pub fn hotspots(
    config: &SurveyConfig,
    criteria: HotspotCriteria,
    top: usize,
) -> Result<HotspotReport, Box<dyn Error>> {
    let summaries = read_region_summaries(&config.output.regions_path)?;
    let report = score_threshold(&summaries, criteria);

    println!(
        "Hotspots: population >= {} and income >= {} with no shops ({} found)",
        format_optional(report.population_threshold),
        format_optional(report.income_threshold),
        report.hotspots.len()
    );
    println!(
        "{:<12} {:>12} {:>12} {:>8}",
        "GEOID", "POPULATION", "INCOME", "AGE"
    );
    for hotspot in report.hotspots.iter().take(top) {
        let d = &hotspot.demographics;
        println!(
            "{:<12} {:>12} {:>12} {:>8}",
            hotspot.aggregate.geoid,
            format_optional(d.population),
            format_optional(d.median_income),
            format_optional(d.median_age)
        );
    }

    write_hotspots_csv(&config.output.hotspots_path, &report.hotspots)?;
    Ok(report)
}

/// Writes model inputs for every tract with complete demographics.
///
/// # Errors
///
/// Returns an error if the region artifact is unreadable or the CSV
/// cannot be written.
pub fn features(config: &SurveyConfig) -> Result<usize, Box<dyn Error>> {
    let summaries = read_region_summaries(&config.output.regions_path)?;
    let inputs = model_inputs(&summaries);

    let skipped = summaries.len() - inputs.len();
    if skipped > 0 {
        log::warn!("{skipped} tracts lack complete demographics and were left out");
    }

    write_model_inputs_csv(&config.output.model_inputs_path, &inputs)?;
    Ok(inputs.len())
}

/// Merges external predictions into opportunity scores, prints the top
/// `top` and writes all of them.
///
/// # Errors
///
/// Returns an error if an input is unreadable or the CSV cannot be
/// written.
pub fn opportunity(
    config: &SurveyConfig,
    predictions_path: &Path,
    top: usize,
) -> Result<Vec<OpportunityScore>, Box<dyn Error>> {
    let summaries = read_region_summaries(&config.output.regions_path)?;
    let predictions = read_predictions_csv(predictions_path)?;
    let scores = opportunity_scores(&summaries, &predictions);

    println!(
        "{:<12} {:>10} {:>6} {:>12}",
        "GEOID", "PREDICTED", "SHOPS", "OPPORTUNITY"
    );
    for score in scores.iter().take(top) {
        println!(
            "{:<12} {:>10.2} {:>6} {:>12.2}",
            score.geoid, score.predicted, score.shop_count, score.score
        );
    }

    write_opportunity_csv(&config.output.opportunity_path, &scores)?;
    Ok(scores)
}

/// Runs collect, analyze and hotspots in sequence.
///
/// # Errors
///
/// Returns the first stage error.
pub async fn run(
    config: &SurveyConfig,
    multi: &MultiProgress,
    criteria: HotspotCriteria,
    top: usize,
) -> Result<(), Box<dyn Error>> {
    let pipeline_start = Instant::now();
    let steps = SurveyProgress::pipeline_stages(multi, "Pipeline", 3);

    steps.set_message("[1/3] Collect".to_string());
    let stats = collect(config, multi).await?;
    steps.inc(1);

    steps.set_message("[2/3] Analyze".to_string());
    analyze(config).await?;
    steps.inc(1);

    steps.set_message("[3/3] Hotspots".to_string());
    let report = hotspots(config, criteria, top)?;
    steps.inc(1);

    steps.finish(format!(
        "Pipeline complete: {} grid points, {} hotspots",
        stats.points,
        report.hotspots.len()
    ));
    log::info!(
        "Pipeline finished in {:.1}s",
        pipeline_start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}
