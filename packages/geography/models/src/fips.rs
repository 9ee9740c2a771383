//! Census FIPS code and tract GEOID helpers.
//!
//! A tract GEOID is the concatenation of a 2-digit state code, a 3-digit
//! county code and a 6-digit tract code (e.g. `"06065030101"`). Sources
//! disagree on zero padding, so every part is normalized before use.

/// Length of a state FIPS code.
pub const STATE_LEN: usize = 2;

/// Length of a county FIPS code.
pub const COUNTY_LEN: usize = 3;

/// Length of a tract code.
pub const TRACT_LEN: usize = 6;

/// Length of a full tract GEOID.
pub const GEOID_LEN: usize = STATE_LEN + COUNTY_LEN + TRACT_LEN;

/// Left-pads a numeric code with zeros to `width` characters.
///
/// Surrounding whitespace is trimmed; codes already at least `width`
/// characters long are returned unchanged.
#[must_use]
pub fn zero_pad(code: &str, width: usize) -> String {
    format!("{:0>width$}", code.trim())
}

/// Builds a tract GEOID from its (possibly unpadded) parts.
#[must_use]
pub fn tract_geoid(state: &str, county: &str, tract: &str) -> String {
    format!(
        "{}{}{}",
        zero_pad(state, STATE_LEN),
        zero_pad(county, COUNTY_LEN),
        zero_pad(tract, TRACT_LEN)
    )
}

/// Returns `true` for an 11-digit tract GEOID.
#[must_use]
pub fn is_tract_geoid(geoid: &str) -> bool {
    geoid.len() == GEOID_LEN && geoid.bytes().all(|b| b.is_ascii_digit())
}

/// County portion of a tract GEOID (characters 3-5), or `None` if the
/// GEOID is not a tract GEOID.
#[must_use]
pub fn county_of(geoid: &str) -> Option<&str> {
    if !is_tract_geoid(geoid) {
        return None;
    }
    geoid.get(STATE_LEN..STATE_LEN + COUNTY_LEN)
}
