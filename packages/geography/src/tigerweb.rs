//! Tract boundary download from the Census Bureau `TIGERweb` REST API.
//!
//! Queries the ACS 2023 vintage tract layer for one county, returning
//! `GeoJSON` in WGS84, and writes it to disk as a `FeatureCollection` that
//! [`crate::boundaries::load_tract_boundaries`] can read.

use std::path::Path;
use std::time::Duration;

use coffee_map_geography_models::fips::{COUNTY_LEN, STATE_LEN, zero_pad};

use crate::GeoError;

/// Tract layer of the ACS 2023 `TIGERweb` map service.
const TIGERWEB_TRACTS_URL: &str =
    "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/tigerWMS_ACS2023/MapServer/8/query";

/// Page size for paginated requests. Kept low to avoid WAF blocks on
/// large geometry responses.
const PAGE_SIZE: u32 = 100;

/// Attempts per page before giving up.
const MAX_ATTEMPTS: u32 = 4;

/// Courtesy delay between pages.
const PAGE_DELAY: Duration = Duration::from_millis(100);

/// Browser-like User-Agent; `TIGERweb` blocks some default agents.
const USER_AGENT: &str = "Mozilla/5.0 (compatible; CoffeeMap/1.0)";

/// Builds a `reqwest::Client` configured for `TIGERweb` requests.
///
/// # Errors
///
/// Returns [`GeoError`] if the client cannot be built.
pub fn build_client() -> Result<reqwest::Client, GeoError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(120))
        .build()
        .map_err(Into::into)
}

/// Downloads every tract polygon in one county and writes them to
/// `output` as a `GeoJSON` `FeatureCollection`.
///
/// Returns the number of features written.
///
/// # Errors
///
/// Returns [`GeoError`] if any page fails after all attempts, the county
/// has no tracts, or the file cannot be written.
pub async fn download_county_tracts(
    client: &reqwest::Client,
    state_fips: &str,
    county_fips: &str,
    output: &Path,
) -> Result<usize, GeoError> {
    let state = zero_pad(state_fips, STATE_LEN);
    let county = zero_pad(county_fips, COUNTY_LEN);
    let features = fetch_county_tracts(client, &state, &county).await?;

    if features.is_empty() {
        return Err(GeoError::Conversion {
            message: format!("TIGERweb has no tracts for county {state}{county}"),
        });
    }

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let collection = serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    });
    let file = std::io::BufWriter::new(std::fs::File::create(output)?);
    serde_json::to_writer(file, &collection)?;

    log::info!(
        "Wrote {} tract boundaries for county {state}{county} to {}",
        features.len(),
        output.display()
    );
    Ok(features.len())
}

/// Fetches every tract feature in the county, following `resultOffset`
/// while the layer reports `exceededTransferLimit`.
async fn fetch_county_tracts(
    client: &reqwest::Client,
    state: &str,
    county: &str,
) -> Result<Vec<serde_json::Value>, GeoError> {
    let filter = format!("STATE='{state}' AND COUNTY='{county}'");
    let mut tracts: Vec<serde_json::Value> = Vec::new();
    let mut offset = 0u32;

    loop {
        let page = fetch_tract_page(client, &filter, &format!("{state}{county}"), offset).await?;
        let (features, exceeded) = split_page(&page).ok_or_else(|| GeoError::Conversion {
            message: format!("Tract page at offset {offset} has no features array"),
        })?;

        if features.is_empty() {
            break;
        }

        #[allow(clippy::cast_possible_truncation)]
        let page_len = features.len() as u32;
        tracts.extend(features.iter().cloned());

        if !exceeded {
            break;
        }

        offset += page_len;
        log::debug!("{} tracts so far for county {state}{county}", tracts.len());
        tokio::time::sleep(PAGE_DELAY).await;
    }

    Ok(tracts)
}

/// Splits a page into its features and the "more pages" flag.
fn split_page(json: &serde_json::Value) -> Option<(&Vec<serde_json::Value>, bool)> {
    let features = json.get("features")?.as_array()?;
    let exceeded = json
        .get("exceededTransferLimit")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    Some((features, exceeded))
}

/// Why a single tract page request did not yield a usable page.
#[derive(Debug, thiserror::Error)]
enum PageFailure {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("body is not JSON: {0}")]
    Body(#[from] serde_json::Error),

    /// The map service answers 200 with an `{"error": ...}` envelope.
    #[error("map service error {0}")]
    Service(serde_json::Value),
}

/// Requests one tract page, retrying with exponential backoff on any
/// [`PageFailure`].
async fn fetch_tract_page(
    client: &reqwest::Client,
    filter: &str,
    county: &str,
    offset: u32,
) -> Result<serde_json::Value, GeoError> {
    let params = [
        ("where", filter.to_string()),
        ("outFields", "GEOID,STATE,COUNTY,NAME".to_string()),
        ("outSR", "4326".to_string()),
        ("f", "geojson".to_string()),
        ("returnGeometry", "true".to_string()),
        ("resultRecordCount", PAGE_SIZE.to_string()),
        ("resultOffset", offset.to_string()),
    ];

    let mut attempt = 1;
    loop {
        let failure = match request_tract_page(client, &params).await {
            Ok(page) => return Ok(page),
            Err(failure) => failure,
        };

        if attempt >= MAX_ATTEMPTS {
            return Err(GeoError::TractDownload {
                county: county.to_string(),
                offset,
                attempts: attempt,
                reason: failure.to_string(),
            });
        }

        let delay = Duration::from_secs(1u64 << attempt);
        log::warn!(
            "Tract page {offset} for county {county}: {failure} \
             (attempt {attempt}/{MAX_ATTEMPTS}, next in {delay:?})"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

async fn request_tract_page(
    client: &reqwest::Client,
    params: &[(&str, String)],
) -> Result<serde_json::Value, PageFailure> {
    let response = client.get(TIGERWEB_TRACTS_URL).query(params).send().await?;
    let status = response.status();
    let body = response.text().await?;
    parse_tract_page(status, &body)
}

/// Classifies a tract page response.
fn parse_tract_page(
    status: reqwest::StatusCode,
    body: &str,
) -> Result<serde_json::Value, PageFailure> {
    if !status.is_success() {
        return Err(PageFailure::Status {
            status,
            body: truncate_for_log(body, 500),
        });
    }

    let mut page: serde_json::Value = serde_json::from_str(body)?;
    if let Some(error) = page.get_mut("error") {
        return Err(PageFailure::Service(error.take()));
    }
    Ok(page)
}

/// Truncates a string for logging on a character boundary.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
