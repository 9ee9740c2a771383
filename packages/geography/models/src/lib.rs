#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Census tract identifiers and demographic types.
//!
//! Demographics come from the American Community Survey 5-year estimates
//! and are keyed by the 11-character tract GEOID.

pub mod fips;

use serde::{Deserialize, Serialize};

/// ACS demographic estimates for one tract.
///
/// Every field is optional: the ACS suppresses estimates for small or
/// unpopulated tracts, and a suppressed value must stay missing rather
/// than read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    /// Total population (`B01003_001E`).
    pub population: Option<f64>,
    /// Median household income in dollars (`B19013_001E`).
    pub median_income: Option<f64>,
    /// Median age in years (`B01002_001E`).
    pub median_age: Option<f64>,
}

impl Demographics {
    /// Returns `true` if every estimate is present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.population.is_some() && self.median_income.is_some() && self.median_age.is_some()
    }
}

/// Demographic estimates tagged with their tract GEOID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TractDemographics {
    /// 11-character tract GEOID.
    pub geoid: String,
    /// Estimates for the tract.
    pub demographics: Demographics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completeness() {
        let mut d = Demographics {
            population: Some(1.0),
            median_income: Some(2.0),
            median_age: Some(3.0),
        };
        assert!(d.is_complete());
        d.median_age = None;
        assert!(!d.is_complete());
        assert!(!Demographics::default().is_complete());
    }
}
