//! Google Places Nearby Search client.
//!
//! - Seed page: `GET {base}?location={lat},{lon}&radius={m}&type={type}&key={key}`
//! - Next page: `GET {base}?pagetoken={token}&key={key}`
//!
//! A page holds at most 20 results and carries `next_page_token` while more
//! results exist. The token only becomes valid a couple of seconds after it
//! is issued; waiting is the collector's job, not this client's.
//!
//! See <https://developers.google.com/maps/documentation/places/web-service/search-nearby>

use std::time::Duration;

use async_trait::async_trait;
use coffee_map_places_models::Place;
use serde::Deserialize;

use crate::PlacesError;
use crate::search::{PlacesSearch, SearchPage, SearchRequest};

/// Default Nearby Search endpoint (JSON output).
pub const NEARBY_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider statuses that mean the request itself succeeded.
const SUCCESS_STATUSES: &[&str] = &["OK", "ZERO_RESULTS"];

/// Nearby Search client bound to a single API key.
pub struct GooglePlacesClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GooglePlacesClient {
    /// Builds a client for `base_url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError`] if the HTTP client cannot be built.
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, PlacesError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.to_owned(),
            api_key: api_key.to_owned(),
        })
    }

    fn query_params(&self, request: &SearchRequest) -> Vec<(&'static str, String)> {
        match request {
            SearchRequest::Nearby {
                point,
                radius_meters,
                place_type,
            } => vec![
                ("location", point.location_param()),
                ("radius", radius_meters.to_string()),
                ("type", place_type.clone()),
                ("key", self.api_key.clone()),
            ],
            SearchRequest::Continuation { token } => vec![
                ("pagetoken", token.clone()),
                ("key", self.api_key.clone()),
            ],
        }
    }
}

#[async_trait]
impl PlacesSearch for GooglePlacesClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, PlacesError> {
        let body = self
            .client
            .get(&self.base_url)
            .query(&self.query_params(request))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(reqwest::Error::without_url)?
            .text()
            .await
            .map_err(reqwest::Error::without_url)?;

        parse_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    results: Vec<RawPlace>,
    next_page_token: Option<String>,
    status: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    place_id: Option<String>,
    name: Option<String>,
    vicinity: Option<String>,
    geometry: Option<RawGeometry>,
    rating: Option<f64>,
    user_ratings_total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    location: Option<RawLocation>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    lat: f64,
    lng: f64,
}

impl RawPlace {
    fn refine(self) -> Option<Place> {
        let id = self.place_id.filter(|id| !id.is_empty())?;
        let location = self.geometry?.location?;

        Some(Place {
            id,
            name: self.name.unwrap_or_default(),
            address: self.vicinity,
            latitude: location.lat,
            longitude: location.lng,
            rating: self.rating,
            review_count: self.user_ratings_total,
        })
    }
}

/// Parses a Nearby Search response body into a [`SearchPage`].
///
/// # Errors
///
/// Returns [`PlacesError::Json`] if the body is not a search response and
/// [`PlacesError::Provider`] if its `status` is not a success status.
pub fn parse_response(body: &str) -> Result<SearchPage, PlacesError> {
    let raw: RawResponse = serde_json::from_str(body)?;

    if let Some(status) = raw.status.as_deref()
        && !SUCCESS_STATUSES.contains(&status)
    {
        return Err(PlacesError::Provider {
            status: status.to_owned(),
            message: raw.error_message.unwrap_or_default(),
        });
    }

    let total = raw.results.len();
    let places: Vec<Place> = raw.results.into_iter().filter_map(RawPlace::refine).collect();

    Ok(SearchPage {
        skipped: (total - places.len()) as u64,
        places,
        next_page_token: raw.next_page_token.filter(|t| !t.is_empty()),
    })
}
