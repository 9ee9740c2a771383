//! Spatial join of places onto tracts.
//!
//! Every place is attributed to the tract whose polygon contains it, then
//! per-tract counts, mean rating and review totals are rolled up. The
//! output has one [`RegionAggregate`] per input region, in input order,
//! whether or not any place matched it.

use std::collections::BTreeMap;

use coffee_map_analytics_models::{RegionAggregate, RegionSummary};
use coffee_map_geography::Region;
use coffee_map_places_models::Place;
use coffee_map_spatial::SpatialIndex;

/// Result of joining a place set onto the region set.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialJoin {
    /// One aggregate per region, in region order.
    pub aggregates: Vec<RegionAggregate>,
    /// Places that fell inside no region.
    pub outside: usize,
    /// Places that fell inside more than one region. Each is counted once,
    /// against the first matching region.
    pub ambiguous: usize,
}

#[derive(Default)]
struct Accumulator {
    shop_count: u64,
    rating_sum: f64,
    rated: u64,
    total_reviews: u64,
}

impl Accumulator {
    fn add(&mut self, place: &Place) {
        self.shop_count += 1;
        if let Some(rating) = place.rating.filter(|r| r.is_finite()) {
            self.rating_sum += rating;
            self.rated += 1;
        }
        if let Some(reviews) = place.review_count {
            self.total_reviews += reviews;
        }
    }

    fn finish(self, geoid: &str) -> RegionAggregate {
        #[allow(clippy::cast_precision_loss)]
        let avg_rating = if self.rated == 0 {
            0.0
        } else {
            self.rating_sum / self.rated as f64
        };

        RegionAggregate {
            geoid: geoid.to_string(),
            shop_count: self.shop_count,
            avg_rating,
            total_reviews: self.total_reviews,
            weighted_avg_rating: 0.0,
        }
    }
}

/// Attributes each place to its containing region and aggregates per
/// region.
///
/// Places sharing an id are counted once, using the last record seen.
/// `weighted_avg_rating` is left at `0`; see [`crate::rating::weight`].
#[must_use]
pub fn aggregate(places: &[Place], regions: &[Region]) -> SpatialJoin {
    let index = SpatialIndex::new(regions.iter().map(|r| (r.geoid.as_str(), &r.boundary)));

    let mut distinct: BTreeMap<&str, &Place> = BTreeMap::new();
    for place in places {
        distinct.insert(place.id.as_str(), place);
    }

    let mut accumulators: Vec<Accumulator> =
        std::iter::repeat_with(Accumulator::default).take(regions.len()).collect();
    let mut outside = 0usize;
    let mut ambiguous = 0usize;

    for place in distinct.values() {
        let hits = index.locate_all(place.longitude, place.latitude);

        let Some(&ordinal) = hits.first() else {
            outside += 1;
            continue;
        };

        if hits.len() > 1 {
            ambiguous += 1;
            log::debug!(
                "Place {} matched {} regions; assigned to {}",
                place.id,
                hits.len(),
                index.geoid(ordinal).unwrap_or("?")
            );
        }

        accumulators[ordinal].add(place);
    }

    if outside > 0 {
        log::warn!("{outside} places fell outside every region and were not counted");
    }
    if ambiguous > 0 {
        log::warn!("{ambiguous} places matched more than one region (overlapping boundaries)");
    }

    let aggregates: Vec<RegionAggregate> = accumulators
        .into_iter()
        .zip(regions)
        .map(|(acc, region)| acc.finish(&region.geoid))
        .collect();

    log::info!(
        "Joined {} places onto {} regions ({} with shops)",
        distinct.len() - outside,
        aggregates.len(),
        aggregates.iter().filter(|a| a.shop_count > 0).count()
    );

    SpatialJoin {
        aggregates,
        outside,
        ambiguous,
    }
}

/// Pairs each aggregate with its region's demographics.
///
/// Aggregates without a region of the same GEOID get all-missing
/// demographics.
#[must_use]
pub fn summarize(aggregates: &[RegionAggregate], regions: &[Region]) -> Vec<RegionSummary> {
    let demographics: BTreeMap<&str, _> = regions
        .iter()
        .map(|r| (r.geoid.as_str(), r.demographics))
        .collect();

    aggregates
        .iter()
        .map(|aggregate| RegionSummary {
            aggregate: aggregate.clone(),
            demographics: demographics
                .get(aggregate.geoid.as_str())
                .copied()
                .unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use coffee_map_geography_models::Demographics;
    use geo::{MultiPolygon, Polygon, polygon};

    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        let p: Polygon<f64> = polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ];
        MultiPolygon(vec![p])
    }

    fn region(geoid: &str, boundary: MultiPolygon<f64>) -> Region {
        Region {
            geoid: geoid.to_string(),
            boundary,
            demographics: Demographics::default(),
        }
    }

    fn place(id: &str, lng: f64, lat: f64, rating: Option<f64>, reviews: Option<u64>) -> Place {
        Place {
            id: id.to_string(),
            name: format!("Cafe {id}"),
            address: None,
            latitude: lat,
            longitude: lng,
            rating,
            review_count: reviews,
        }
    }

    #[test]
    fn every_region_gets_an_aggregate() {
        let regions = vec![
            region("A", square(0.0, 0.0, 1.0)),
            region("B", square(1.0, 0.0, 1.0)),
        ];
        let places = vec![
            place("p1", 0.5, 0.5, Some(4.0), Some(10)),
            place("p2", 0.25, 0.75, Some(5.0), Some(5)),
        ];

        let join = aggregate(&places, &regions);

        assert_eq!(join.aggregates.len(), 2);
        let a = &join.aggregates[0];
        assert_eq!(a.geoid, "A");
        assert_eq!(a.shop_count, 2);
        assert!((a.avg_rating - 4.5).abs() < 1e-12);
        assert_eq!(a.total_reviews, 15);

        assert_eq!(join.aggregates[1], RegionAggregate::empty("B"));
        assert_eq!(join.outside, 0);
    }

    #[test]
    fn missing_ratings_and_reviews_are_excluded() {
        let regions = vec![region("A", square(0.0, 0.0, 1.0))];
        let places = vec![
            place("p1", 0.5, 0.5, Some(3.0), None),
            place("p2", 0.6, 0.5, None, Some(8)),
        ];

        let a = &aggregate(&places, &regions).aggregates[0];

        assert_eq!(a.shop_count, 2);
        assert!((a.avg_rating - 3.0).abs() < 1e-12);
        assert_eq!(a.total_reviews, 8);
    }

    #[test]
    fn shops_without_any_rating_average_to_zero() {
        let regions = vec![region("A", square(0.0, 0.0, 1.0))];
        let places = vec![place("p1", 0.5, 0.5, None, None)];

        let a = &aggregate(&places, &regions).aggregates[0];

        assert_eq!(a.shop_count, 1);
        assert!(a.avg_rating.abs() < f64::EPSILON);
        assert_eq!(a.total_reviews, 0);
    }

    #[test]
    fn places_outside_every_region_are_dropped() {
        let regions = vec![region("A", square(0.0, 0.0, 1.0))];
        let places = vec![
            place("in", 0.5, 0.5, Some(4.0), Some(1)),
            place("out", 9.0, 9.0, Some(1.0), Some(100)),
        ];

        let join = aggregate(&places, &regions);

        assert_eq!(join.outside, 1);
        assert_eq!(join.aggregates[0].shop_count, 1);
        assert_eq!(join.aggregates[0].total_reviews, 1);
    }

    #[test]
    fn overlapping_regions_count_place_once() {
        let regions = vec![
            region("BIG", square(0.0, 0.0, 2.0)),
            region("SMALL", square(0.5, 0.5, 1.0)),
        ];
        let places = vec![place("p1", 1.0, 1.0, Some(4.0), Some(3))];

        let join = aggregate(&places, &regions);

        assert_eq!(join.ambiguous, 1);
        let total: u64 = join.aggregates.iter().map(|a| a.shop_count).sum();
        assert_eq!(total, 1);
        assert_eq!(join.aggregates[0].shop_count, 1);
    }

    #[test]
    fn repeated_ids_count_once() {
        let regions = vec![region("A", square(0.0, 0.0, 1.0))];
        let places = vec![
            place("p1", 0.5, 0.5, Some(4.0), Some(10)),
            place("p1", 0.5, 0.5, Some(4.2), Some(12)),
        ];

        let a = &aggregate(&places, &regions).aggregates[0];

        assert_eq!(a.shop_count, 1);
        assert_eq!(a.total_reviews, 12);
    }

    #[test]
    fn summaries_carry_demographics() {
        let mut a = region("A", square(0.0, 0.0, 1.0));
        a.demographics.population = Some(50_000.0);
        let regions = vec![a];
        let aggregates = vec![RegionAggregate::empty("A"), RegionAggregate::empty("Z")];

        let summaries = summarize(&aggregates, &regions);

        assert_eq!(summaries[0].demographics.population, Some(50_000.0));
        assert_eq!(summaries[1].demographics, Demographics::default());
    }
}
