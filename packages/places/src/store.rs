//! Places CSV artifact.
//!
//! Columns: `place_id,name,address,latitude,longitude,rating,review_count`.
//! Missing optional values are written as empty cells and read back as
//! missing, never as zero.

use std::fs;
use std::path::Path;

use coffee_map_places_models::Place;

use crate::PlacesError;

/// Writes places to `path`, sorted by place id, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns [`PlacesError`] if the file cannot be created or written.
pub fn write_places_csv<'a>(
    path: &Path,
    places: impl IntoIterator<Item = &'a Place>,
) -> Result<u64, PlacesError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut sorted: Vec<&Place> = places.into_iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut writer = csv::Writer::from_path(path)?;
    for place in &sorted {
        writer.serialize(place)?;
    }
    writer.flush()?;

    log::info!("Wrote {} places to {}", sorted.len(), path.display());
    Ok(sorted.len() as u64)
}

/// Reads the places CSV artifact.
///
/// # Errors
///
/// Returns [`PlacesError`] if the file cannot be opened or a row does not
/// match the schema.
pub fn read_places_csv(path: &Path) -> Result<Vec<Place>, PlacesError> {
    let mut reader = csv::Reader::from_path(path)?;
    let places = reader
        .deserialize::<Place>()
        .collect::<Result<Vec<_>, _>>()?;

    log::info!("Read {} places from {}", places.len(), path.display());
    Ok(places)
}
