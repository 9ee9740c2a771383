//! ACS 5-year demographic estimates from the Census Bureau API.
//!
//! The API answers with a JSON array of arrays whose first row is the
//! header:
//!
//! ```text
//! [["NAME","B01003_001E","B19013_001E","B01002_001E","state","county","tract"],
//!  ["Census Tract 301.01; ...","4821","91250","36.4","06","065","030101"], ...]
//! ```
//!
//! Columns are located by header name, so the column order does not
//! matter.

use coffee_map_geography_models::fips::{COUNTY_LEN, STATE_LEN, tract_geoid, zero_pad};
use coffee_map_geography_models::{Demographics, TractDemographics};

use crate::GeoError;

/// ACS 5-year detailed tables endpoint; `{year}` is substituted.
const ACS5_URL: &str = "https://api.census.gov/data/{year}/acs/acs5";

/// Total population.
pub const POPULATION_VAR: &str = "B01003_001E";
/// Median household income in the past 12 months.
pub const MEDIAN_INCOME_VAR: &str = "B19013_001E";
/// Median age.
pub const MEDIAN_AGE_VAR: &str = "B01002_001E";

/// The ACS reports suppressed or unavailable estimates as large negative
/// annotation codes (`-222222222` through `-999999999`).
const ANNOTATION_THRESHOLD: f64 = -222_222_222.0;

/// Fetches population, median income and median age for every tract in
/// one county.
///
/// # Errors
///
/// Returns [`GeoError`] if the request fails, the server answers with a
/// non-success status, or the body is not a well-formed ACS table.
pub async fn fetch_tract_demographics(
    client: &reqwest::Client,
    year: u16,
    state_fips: &str,
    county_fips: &str,
    api_key: Option<&str>,
) -> Result<Vec<TractDemographics>, GeoError> {
    let state = zero_pad(state_fips, STATE_LEN);
    let county = zero_pad(county_fips, COUNTY_LEN);
    let url = ACS5_URL.replace("{year}", &year.to_string());

    let mut params = vec![
        (
            "get",
            format!("NAME,{POPULATION_VAR},{MEDIAN_INCOME_VAR},{MEDIAN_AGE_VAR}"),
        ),
        ("for", "tract:*".to_string()),
        ("in", format!("state:{state} county:{county}")),
    ];
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        params.push(("key", key.to_string()));
    }

    log::info!("Fetching ACS {year} demographics for county {state}{county}...");

    let body = get_text(client, &url, &params).await?;

    let rows: Vec<Vec<serde_json::Value>> =
        serde_json::from_str(&body).map_err(|e| GeoError::Conversion {
            message: format!("Failed to parse ACS response for county {state}{county}: {e}"),
        })?;

    let demographics = parse_acs_rows(&rows)?;
    log::info!(
        "Fetched demographics for {} tracts in county {state}{county}",
        demographics.len()
    );
    Ok(demographics)
}

/// GETs `url` and returns the body. Request URLs carry the API key, so
/// they are stripped from any error before it propagates.
async fn get_text(
    client: &reqwest::Client,
    url: &str,
    params: &[(&str, String)],
) -> Result<String, GeoError> {
    let body = client
        .get(url)
        .query(params)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(reqwest::Error::without_url)?
        .text()
        .await
        .map_err(reqwest::Error::without_url)?;
    Ok(body)
}

/// Converts an ACS array-of-arrays table into per-tract demographics.
///
/// # Errors
///
/// Returns [`GeoError::Conversion`] if the table is empty or a required
/// column is missing from the header.
pub fn parse_acs_rows(rows: &[Vec<serde_json::Value>]) -> Result<Vec<TractDemographics>, GeoError> {
    let header = rows.first().ok_or_else(|| GeoError::Conversion {
        message: "ACS response has no header row".to_string(),
    })?;

    let column = |name: &str| {
        header
            .iter()
            .position(|cell| cell.as_str() == Some(name))
            .ok_or_else(|| GeoError::Conversion {
                message: format!("ACS response is missing column {name}"),
            })
    };

    let population = column(POPULATION_VAR)?;
    let income = column(MEDIAN_INCOME_VAR)?;
    let age = column(MEDIAN_AGE_VAR)?;
    let state = column("state")?;
    let county = column("county")?;
    let tract = column("tract")?;

    let mut out = Vec::with_capacity(rows.len().saturating_sub(1));
    for row in rows.iter().skip(1) {
        let (Some(s), Some(c), Some(t)) = (
            row.get(state).and_then(code),
            row.get(county).and_then(code),
            row.get(tract).and_then(code),
        ) else {
            log::warn!("Skipping ACS row without geography codes: {row:?}");
            continue;
        };

        out.push(TractDemographics {
            geoid: tract_geoid(&s, &c, &t),
            demographics: Demographics {
                population: row.get(population).and_then(estimate),
                median_income: row.get(income).and_then(estimate),
                median_age: row.get(age).and_then(estimate),
            },
        });
    }

    Ok(out)
}

fn code(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses one estimate cell. Non-numeric cells, nulls and annotation
/// codes become `None`.
fn estimate(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        serde_json::Value::Number(n) => n.as_f64()?,
        _ => return None,
    };

    (parsed.is_finite() && parsed > ANNOTATION_THRESHOLD).then_some(parsed)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn table(rows: &serde_json::Value) -> Vec<Vec<serde_json::Value>> {
        serde_json::from_value(rows.clone()).unwrap()
    }

    #[test]
    fn parses_rows_by_header_name() {
        let rows = table(&json!([
            ["NAME", "B01003_001E", "B19013_001E", "B01002_001E", "state", "county", "tract"],
            ["Tract 301.01", "4821", "91250", "36.4", "06", "065", "030101"],
            ["Tract 9", "1200", "-666666666", null, "6", "65", "900"]
        ]));

        let parsed = parse_acs_rows(&rows).unwrap();
        assert_eq!(parsed.len(), 2);

        assert_eq!(parsed[0].geoid, "06065030101");
        assert_eq!(parsed[0].demographics.population, Some(4821.0));
        assert_eq!(parsed[0].demographics.median_income, Some(91250.0));
        assert_eq!(parsed[0].demographics.median_age, Some(36.4));

        assert_eq!(parsed[1].geoid, "06065000900");
        assert_eq!(parsed[1].demographics.population, Some(1200.0));
        assert_eq!(parsed[1].demographics.median_income, None);
        assert_eq!(parsed[1].demographics.median_age, None);
    }

    #[test]
    fn column_order_does_not_matter() {
        let rows = table(&json!([
            ["tract", "county", "state", "B01002_001E", "B19013_001E", "B01003_001E"],
            ["030101", "065", "06", "40", "50000", "3000"]
        ]));

        let parsed = parse_acs_rows(&rows).unwrap();
        assert_eq!(parsed[0].geoid, "06065030101");
        assert_eq!(parsed[0].demographics.population, Some(3000.0));
        assert_eq!(parsed[0].demographics.median_age, Some(40.0));
    }

    #[test]
    fn non_numeric_estimates_are_missing_not_zero() {
        assert_eq!(estimate(&json!("N/A")), None);
        assert_eq!(estimate(&json!("")), None);
        assert_eq!(estimate(&json!(null)), None);
        assert_eq!(estimate(&json!("-999999999")), None);
        assert_eq!(estimate(&json!("0")), Some(0.0));
        assert_eq!(estimate(&json!(12.5)), Some(12.5));
    }

    #[test]
    fn missing_column_is_an_error() {
        let rows = table(&json!([["NAME", "state", "county", "tract"]]));
        assert!(matches!(
            parse_acs_rows(&rows),
            Err(GeoError::Conversion { .. })
        ));
        assert!(parse_acs_rows(&[]).is_err());
    }

    #[tokio::test]
    async fn request_errors_do_not_leak_the_key() {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let params = [("key", "CENSUS_SECRET_456".to_string())];

        let err = get_text(&client, "http://127.0.0.1:9/data/2022/acs/acs5", &params)
            .await
            .unwrap_err();

        assert!(matches!(err, GeoError::Http(_)));
        assert!(!err.to_string().contains("CENSUS_SECRET_456"), "{err}");
    }
}
