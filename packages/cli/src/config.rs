//! Survey configuration.
//!
//! Loaded from `coffee_map.toml` (or the file named with `--config`).
//! Every field has a default, so a missing default file or a partial file
//! is fine. Credentials never live in the file; they come from the
//! environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use coffee_map_geography_models::fips::{COUNTY_LEN, STATE_LEN, zero_pad};
use coffee_map_places::google::NEARBY_SEARCH_URL;
use serde::{Deserialize, Serialize};

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "coffee_map.toml";

/// Environment variable holding the places provider key.
pub const PLACES_API_KEY_VAR: &str = "GOOGLE_PLACES_API_KEY";

/// Environment variable holding the optional Census API key.
pub const CENSUS_API_KEY_VAR: &str = "CENSUS_API_KEY";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`SurveyConfig`].
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("Invalid config value: {0}")]
    Invalid(String),

    /// A required credential is not set.
    #[error("Environment variable {0} is not set")]
    MissingCredential(&'static str),
}

/// Places search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Search circle radius around each grid point.
    pub radius_meters: f64,
    /// Provider place-type filter.
    pub place_type: String,
    /// Nearby Search endpoint.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            radius_meters: 2000.0,
            place_type: "cafe".to_string(),
            base_url: NEARBY_SEARCH_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl SearchConfig {
    /// Per-request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Study area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionConfig {
    /// State FIPS code.
    pub state_fips: String,
    /// County FIPS code.
    pub county_fips: String,
    /// Tract boundary `GeoJSON`.
    pub boundary_path: PathBuf,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            state_fips: "06".to_string(),
            county_fips: "065".to_string(),
            boundary_path: PathBuf::from("data/tracts.geojson"),
        }
    }
}

/// ACS settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CensusConfig {
    /// ACS 5-year vintage.
    pub year: u16,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self { year: 2022 }
    }
}

/// Artifact locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Unique places CSV.
    pub places_path: PathBuf,
    /// Region `GeoJSON`.
    pub regions_path: PathBuf,
    /// Threshold hotspots CSV.
    pub hotspots_path: PathBuf,
    /// Model inputs CSV.
    pub model_inputs_path: PathBuf,
    /// Opportunity scores CSV.
    pub opportunity_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            places_path: PathBuf::from("data/places.csv"),
            regions_path: PathBuf::from("data/regions.geojson"),
            hotspots_path: PathBuf::from("data/hotspots.csv"),
            model_inputs_path: PathBuf::from("data/model_inputs.csv"),
            opportunity_path: PathBuf::from("data/opportunity.csv"),
        }
    }
}

/// Complete survey configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurveyConfig {
    /// Places search settings.
    pub search: SearchConfig,
    /// Study area.
    pub region: RegionConfig,
    /// ACS settings.
    pub census: CensusConfig,
    /// Artifact locations.
    pub output: OutputConfig,
}

impl SurveyConfig {
    /// Loads configuration from `path`, or from [`DEFAULT_CONFIG_PATH`]
    /// if it exists, or falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicitly named file is missing, or
    /// any file read is unreadable or invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    log::debug!("No {DEFAULT_CONFIG_PATH} found, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let config = Self::parse(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parses and normalizes configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid configuration.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        self.region.state_fips = zero_pad(&self.region.state_fips, STATE_LEN);
        self.region.county_fips = zero_pad(&self.region.county_fips, COUNTY_LEN);
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.search.radius_meters.is_finite() && self.search.radius_meters > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "search.radius_meters must be positive, got {}",
                self.search.radius_meters
            )));
        }
        if self.search.place_type.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "search.place_type must not be empty".to_string(),
            ));
        }
        if self.search.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "search.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads the places provider key from [`PLACES_API_KEY_VAR`].
///
/// # Errors
///
/// Returns [`ConfigError::MissingCredential`] if the variable is unset or
/// empty.
pub fn places_api_key() -> Result<String, ConfigError> {
    std::env::var(PLACES_API_KEY_VAR)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or(ConfigError::MissingCredential(PLACES_API_KEY_VAR))
}

/// Reads the optional Census key from [`CENSUS_API_KEY_VAR`].
#[must_use]
pub fn census_api_key() -> Option<String> {
    std::env::var(CENSUS_API_KEY_VAR)
        .ok()
        .filter(|key| !key.trim().is_empty())
}
