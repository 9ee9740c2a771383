#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for tract attribution.
//!
//! Bulk-loads tract polygons into an R-tree keyed by their bounding boxes
//! and answers point-in-polygon queries against it. Coordinates are
//! `(longitude, latitude)` in the same frame as the polygons.
//!
//! Each boundary keeps the position it was inserted at (its ordinal) so
//! callers can map hits back to their own ordered region list.

use geo::{BoundingRect, Contains, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};

/// A boundary polygon stored in the R-tree with its metadata.
struct BoundaryEntry {
    ordinal: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Point-in-polygon index over a fixed set of boundaries.
pub struct SpatialIndex {
    tree: RTree<BoundaryEntry>,
    geoids: Vec<String>,
}

impl SpatialIndex {
    /// Builds the index. Boundaries are numbered in iteration order.
    pub fn new<'a>(boundaries: impl IntoIterator<Item = (&'a str, &'a MultiPolygon<f64>)>) -> Self {
        let mut geoids = Vec::new();
        let mut entries = Vec::new();

        for (ordinal, (geoid, polygon)) in boundaries.into_iter().enumerate() {
            geoids.push(geoid.to_string());

            let Some(envelope) = compute_envelope(polygon) else {
                log::warn!("Boundary {geoid} is empty and will never match");
                continue;
            };

            entries.push(BoundaryEntry {
                ordinal,
                envelope,
                polygon: polygon.clone(),
            });
        }

        log::debug!("Built spatial index over {} boundaries", entries.len());

        Self {
            tree: RTree::bulk_load(entries),
            geoids,
        }
    }

    /// Number of boundaries the index was built from.
    #[must_use]
    pub fn len(&self) -> usize {
        self.geoids.len()
    }

    /// Returns `true` if the index was built from no boundaries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geoids.is_empty()
    }

    /// GEOID of the boundary at `ordinal`.
    #[must_use]
    pub fn geoid(&self, ordinal: usize) -> Option<&str> {
        self.geoids.get(ordinal).map(String::as_str)
    }

    /// Ordinals of every boundary whose interior contains the point,
    /// ascending. Points on a boundary edge are not contained.
    #[must_use]
    pub fn locate_all(&self, lng: f64, lat: f64) -> Vec<usize> {
        let point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .map(|entry| entry.ordinal)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Ordinal of the containing boundary. Tracts tile without overlap, so
    /// when several match the lowest ordinal wins.
    #[must_use]
    pub fn locate(&self, lng: f64, lat: f64) -> Option<usize> {
        self.locate_all(lng, lat).first().copied()
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
