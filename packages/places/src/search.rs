//! Provider-agnostic nearby-search interface.

use async_trait::async_trait;
use coffee_map_places_models::{GridPoint, Place};

use crate::PlacesError;

/// One request to the nearby-search endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchRequest {
    /// The seed page for a grid point.
    Nearby {
        /// Search origin.
        point: GridPoint,
        /// Search radius in meters.
        radius_meters: f64,
        /// Provider place-type filter (e.g. `"cafe"`).
        place_type: String,
    },
    /// A follow-up page, addressed only by the token from the previous
    /// page.
    Continuation {
        /// Opaque continuation token.
        token: String,
    },
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Places parsed from the page.
    pub places: Vec<Place>,
    /// Token for the next page; `None` ends pagination.
    pub next_page_token: Option<String>,
    /// Results dropped because they lacked an id or a location.
    pub skipped: u64,
}

/// A radius-bounded nearby-search provider.
#[async_trait]
pub trait PlacesSearch: Send + Sync {
    /// Executes one search request and returns its page.
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError`] on transport failure, a non-success HTTP
    /// status, an undecodable body, or a provider-level error status.
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, PlacesError>;
}

#[async_trait]
impl<T: PlacesSearch + ?Sized> PlacesSearch for std::sync::Arc<T> {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, PlacesError> {
        (**self).search(request).await
    }
}
