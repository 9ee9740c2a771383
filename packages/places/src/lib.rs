#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Exhaustive area survey over a radius-bounded nearby-search API.
//!
//! The search provider only answers "what is near this point", capped at
//! 60 results per point. To survey a whole county we tile its envelope
//! with overlapping search circles ([`grid`]), query every circle and
//! drain its pagination ([`collector`]), and fold every observation into
//! one registry keyed by the provider's stable place id so that the
//! overlap never double-counts a place.
//!
//! The provider itself sits behind the [`search::PlacesSearch`] trait;
//! [`google`] is the production implementation.

pub mod collector;
pub mod google;
pub mod grid;
pub mod progress;
pub mod search;
pub mod store;

pub use coffee_map_places_models::{BoundingBox, GridPoint, Place};

/// Errors that can occur while searching for or persisting places.
#[derive(Debug, thiserror::Error)]
pub enum PlacesError {
    /// HTTP request failed (transport error, timeout, non-success status).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The provider answered with a non-success status in its body.
    #[error("Provider returned status {status}: {message}")]
    Provider {
        /// Provider status code (e.g. `"REQUEST_DENIED"`).
        status: String,
        /// Provider error message, if any.
        message: String,
    },
}
