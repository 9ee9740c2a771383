//! Bayesian-shrinkage ("weighted") tract ratings.
//!
//! A tract's weighted rating blends its own mean rating `R` with the
//! survey-wide mean `C`, in proportion to its review volume `v` against a
//! credibility threshold `m`:
//!
//! ```text
//! W = v / (v + m) * R + m / (v + m) * C
//! ```
//!
//! Tracts with many reviews keep their own rating; tracts with few are
//! pulled toward the global mean.

use coffee_map_analytics_models::{GlobalRatingStats, RegionAggregate};
use coffee_map_places_models::Place;

use crate::stats::{mean, quantile};

/// Review-count percentile used as the credibility threshold `m`.
pub const REVIEW_THRESHOLD_QUANTILE: f64 = 0.75;

/// Computes the shrinkage prior from every collected place: `C` is the
/// mean rating over rated places, `m` the 75th-percentile review count
/// over places reporting one.
#[must_use]
pub fn global_stats(places: &[Place]) -> GlobalRatingStats {
    #[allow(clippy::cast_precision_loss)]
    let review_counts = places
        .iter()
        .filter_map(|p| p.review_count)
        .map(|v| v as f64);

    GlobalRatingStats {
        mean_rating: mean(places.iter().filter_map(|p| p.rating)),
        review_threshold: quantile(review_counts, REVIEW_THRESHOLD_QUANTILE),
        place_count: places.len() as u64,
    }
}

/// The shrinkage formula. Returns `0` when `v + m` is zero.
#[must_use]
pub fn weighted_rating(v: f64, r: f64, c: f64, m: f64) -> f64 {
    let denominator = v + m;
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }

    let weighted = (v / denominator).mul_add(r, (m / denominator) * c);
    if weighted.is_finite() { weighted } else { 0.0 }
}

/// Fills `weighted_avg_rating` on every aggregate.
///
/// Tracts with no shops get `0`, as does every tract when the prior is
/// unavailable (no rated or no reviewed places in the survey).
pub fn weight(aggregates: &mut [RegionAggregate], stats: &GlobalRatingStats) {
    let (Some(c), Some(m)) = (stats.mean_rating, stats.review_threshold) else {
        log::warn!("No rating prior available; weighted ratings default to 0");
        for aggregate in aggregates.iter_mut() {
            aggregate.weighted_avg_rating = 0.0;
        }
        return;
    };

    for aggregate in aggregates.iter_mut() {
        aggregate.weighted_avg_rating = if aggregate.shop_count == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let v = aggregate.total_reviews as f64;
            weighted_rating(v, aggregate.avg_rating, c, m)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(rating: Option<f64>, reviews: Option<u64>) -> Place {
        Place {
            id: format!("{rating:?}-{reviews:?}"),
            name: "Cafe".to_string(),
            address: None,
            latitude: 0.0,
            longitude: 0.0,
            rating,
            review_count: reviews,
        }
    }

    #[test]
    fn global_stats_skip_missing_values() {
        let places = vec![
            place(Some(4.0), Some(10)),
            place(Some(5.0), Some(5)),
            place(None, Some(1)),
            place(Some(3.0), None),
        ];

        let stats = global_stats(&places);

        assert_eq!(stats.place_count, 4);
        assert!((stats.mean_rating.unwrap() - 4.0).abs() < 1e-12);
        // review counts [1, 5, 10] -> position 1.5 -> 7.5
        assert!((stats.review_threshold.unwrap() - 7.5).abs() < 1e-12);
    }

    #[test]
    fn global_stats_of_nothing() {
        let stats = global_stats(&[]);
        assert_eq!(stats.mean_rating, None);
        assert_eq!(stats.review_threshold, None);
        assert_eq!(stats.place_count, 0);
    }

    #[test]
    fn worked_example() {
        let mut aggregates = vec![
            RegionAggregate {
                geoid: "A".to_string(),
                shop_count: 2,
                avg_rating: 4.5,
                total_reviews: 15,
                weighted_avg_rating: 0.0,
            },
            RegionAggregate::empty("B"),
        ];
        let stats = GlobalRatingStats {
            mean_rating: Some(4.5),
            review_threshold: Some(7.0),
            place_count: 2,
        };

        weight(&mut aggregates, &stats);

        assert!((aggregates[0].weighted_avg_rating - 4.5).abs() < 1e-12);
        assert!(aggregates[1].weighted_avg_rating.abs() < f64::EPSILON);
    }

    #[test]
    fn shrinks_toward_global_mean() {
        // v = 3, m = 7, R = 5, C = 4 -> 0.3 * 5 + 0.7 * 4 = 4.3
        assert!((weighted_rating(3.0, 5.0, 4.0, 7.0) - 4.3).abs() < 1e-12);
        // shops but no reviews take the prior
        assert!((weighted_rating(0.0, 0.0, 4.2, 7.0) - 4.2).abs() < 1e-12);
    }

    #[test]
    fn zero_denominator_is_zero() {
        assert!(weighted_rating(0.0, 4.0, 3.0, 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stays_between_own_and_global_rating() {
        for v in [0.0, 1.0, 5.0, 50.0, 1e6] {
            for m in [0.0, 0.5, 7.0, 100.0] {
                for (r, c) in [(1.0, 5.0), (4.8, 3.1), (2.0, 2.0)] {
                    let w = weighted_rating(v, r, c, m);
                    if v + m == 0.0 {
                        assert!(w.abs() < f64::EPSILON);
                        continue;
                    }
                    let lo = f64::min(r, c) - 1e-9;
                    let hi = f64::max(r, c) + 1e-9;
                    assert!((lo..=hi).contains(&w), "v={v} m={m} r={r} c={c} -> {w}");
                }
            }
        }
    }

    #[test]
    fn limits() {
        assert!((weighted_rating(1e12, 4.9, 3.0, 7.0) - 4.9).abs() < 1e-9);
        assert!((weighted_rating(1e-12, 4.9, 3.0, 7.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn missing_prior_zeroes_everything() {
        let mut aggregates = vec![RegionAggregate {
            geoid: "A".to_string(),
            shop_count: 1,
            avg_rating: 4.0,
            total_reviews: 3,
            weighted_avg_rating: 9.0,
        }];
        let stats = GlobalRatingStats {
            mean_rating: Some(4.0),
            review_threshold: None,
            place_count: 1,
        };

        weight(&mut aggregates, &stats);

        assert!(aggregates[0].weighted_avg_rating.abs() < f64::EPSILON);
    }
}
