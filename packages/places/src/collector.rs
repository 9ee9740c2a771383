//! Grid-wide place collection with cross-point de-duplication.
//!
//! For every grid point the collector draws a seed page and then follows
//! continuation tokens, up to [`MAX_PAGES_PER_POINT`] pages. Every place on
//! every page is merged into a single [`PlaceRegistry`] keyed by place id,
//! so a place seen from several overlapping search circles is stored once.
//!
//! A failed request only ends pagination for its own grid point. Pages
//! already merged for that point are kept and the run moves on.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use coffee_map_places_models::{GridPoint, Place};

use crate::progress::ProgressCallback;
use crate::search::{PlacesSearch, SearchRequest};

/// The provider never serves more than three pages (60 results) per
/// search origin.
pub const MAX_PAGES_PER_POINT: u32 = 3;

/// How long a continuation token takes to become valid after it is
/// issued. Requests made sooner are rejected by the provider.
pub const PAGE_TOKEN_DELAY: Duration = Duration::from_secs(2);

/// Unique places keyed by provider id.
///
/// Merging is last-write-wins: a re-observed place replaces the stored
/// record, so volatile fields (rating, review count) reflect the most
/// recent observation.
#[derive(Debug, Clone, Default)]
pub struct PlaceRegistry {
    places: BTreeMap<String, Place>,
}

impl PlaceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            places: BTreeMap::new(),
        }
    }

    /// Inserts `place`, overwriting any record with the same id.
    ///
    /// Returns `true` if the id was not present before.
    pub fn upsert(&mut self, place: Place) -> bool {
        self.places.insert(place.id.clone(), place).is_none()
    }

    /// Looks up a place by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Place> {
        self.places.get(id)
    }

    /// Number of distinct places.
    #[must_use]
    pub fn len(&self) -> usize {
        self.places.len()
    }

    /// Returns `true` if no place has been merged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    /// Iterates places in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Place> {
        self.places.values()
    }
}

/// Counters describing one collection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Grid points visited.
    pub points: u64,
    /// Result pages successfully drawn.
    pub pages: u64,
    /// Places merged, counting every re-observation.
    pub observations: u64,
    /// Grid points whose pagination ended on an error.
    pub failed_points: u64,
    /// Results dropped for lacking an id or location.
    pub skipped_results: u64,
}

/// What happened at a single grid point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointOutcome {
    /// Pages successfully drawn.
    pub pages: u32,
    /// Places merged from those pages.
    pub observations: u64,
    /// Places not previously in the registry.
    pub new_places: u64,
    /// Whether a request failed.
    pub failed: bool,
    /// Results dropped for lacking an id or location.
    pub skipped_results: u64,
}

/// Walks a search grid and accumulates a de-duplicated place registry.
pub struct PlaceCollector<S: PlacesSearch> {
    search: S,
    radius_meters: f64,
    place_type: String,
    registry: PlaceRegistry,
    stats: CollectionStats,
}

impl<S: PlacesSearch> PlaceCollector<S> {
    /// Creates a collector that searches `radius_meters` around each point
    /// for places of `place_type`.
    #[must_use]
    pub fn new(search: S, radius_meters: f64, place_type: &str) -> Self {
        Self {
            search,
            radius_meters,
            place_type: place_type.to_owned(),
            registry: PlaceRegistry::new(),
            stats: CollectionStats::default(),
        }
    }

    /// Places merged so far.
    #[must_use]
    pub const fn registry(&self) -> &PlaceRegistry {
        &self.registry
    }

    /// Searches every point in order and returns the registry together
    /// with the run's counters.
    ///
    /// Never fails: per-point errors are logged and counted.
    pub async fn collect(
        mut self,
        points: &[GridPoint],
        progress: &Arc<dyn ProgressCallback>,
    ) -> (PlaceRegistry, CollectionStats) {
        progress.set_total(points.len() as u64);

        for (i, point) in points.iter().enumerate() {
            let outcome = self.collect_point(point).await;

            log::debug!(
                "Grid point {}/{} ({}): {} pages, {} results, {} new",
                i + 1,
                points.len(),
                point.location_param(),
                outcome.pages,
                outcome.observations,
                outcome.new_places
            );

            progress.inc(1);
            progress.set_message(format!("{} unique places", self.registry.len()));
        }

        progress.finish(format!(
            "{} unique places from {} grid points",
            self.registry.len(),
            points.len()
        ));

        if self.stats.skipped_results > 0 {
            log::warn!(
                "Skipped {} results lacking a place id or location",
                self.stats.skipped_results
            );
        }

        log::info!(
            "Collection complete: {} unique places, {} observations, {} pages, \
             {}/{} grid points failed",
            self.registry.len(),
            self.stats.observations,
            self.stats.pages,
            self.stats.failed_points,
            self.stats.points
        );

        (self.registry, self.stats)
    }

    /// Draws up to [`MAX_PAGES_PER_POINT`] pages for one grid point and
    /// merges them into the registry.
    pub async fn collect_point(&mut self, point: &GridPoint) -> PointOutcome {
        let mut outcome = PointOutcome::default();
        let mut request = SearchRequest::Nearby {
            point: *point,
            radius_meters: self.radius_meters,
            place_type: self.place_type.clone(),
        };

        loop {
            let page = match self.search.search(&request).await {
                Ok(page) => page,
                Err(e) => {
                    log::warn!(
                        "Search failed at {} (page {}): {e}",
                        point.location_param(),
                        outcome.pages + 1
                    );
                    outcome.failed = true;
                    break;
                }
            };

            outcome.pages += 1;
            outcome.skipped_results += page.skipped;

            for place in page.places {
                outcome.observations += 1;
                if self.registry.upsert(place) {
                    outcome.new_places += 1;
                }
            }

            let Some(token) = page.next_page_token else {
                break;
            };
            if outcome.pages >= MAX_PAGES_PER_POINT {
                break;
            }

            tokio::time::sleep(PAGE_TOKEN_DELAY).await;
            request = SearchRequest::Continuation { token };
        }

        self.stats.points += 1;
        self.stats.pages += u64::from(outcome.pages);
        self.stats.observations += outcome.observations;
        self.stats.skipped_results += outcome.skipped_results;
        if outcome.failed {
            self.stats.failed_points += 1;
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::PlacesError;
    use crate::progress::null_progress;
    use crate::search::SearchPage;

    fn place(id: &str, rating: Option<f64>) -> Place {
        Place {
            id: id.to_owned(),
            name: format!("Cafe {id}"),
            address: None,
            latitude: 33.9,
            longitude: -117.4,
            rating,
            review_count: Some(10),
        }
    }

    fn page(ids: &[&str], token: Option<&str>) -> Result<SearchPage, PlacesError> {
        Ok(SearchPage {
            places: ids.iter().map(|id| place(id, Some(4.0))).collect(),
            next_page_token: token.map(str::to_owned),
            skipped: 0,
        })
    }

    fn failure() -> Result<SearchPage, PlacesError> {
        Err(PlacesError::Provider {
            status: "UNKNOWN_ERROR".to_owned(),
            message: String::new(),
        })
    }

    /// Replays scripted responses in order and records every request.
    #[derive(Default)]
    struct ScriptedSearch {
        responses: Mutex<VecDeque<Result<SearchPage, PlacesError>>>,
        requests: Mutex<Vec<(SearchRequest, Instant)>>,
    }

    impl ScriptedSearch {
        fn new(responses: Vec<Result<SearchPage, PlacesError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PlacesSearch for ScriptedSearch {
        async fn search(&self, request: &SearchRequest) -> Result<SearchPage, PlacesError> {
            self.requests
                .lock()
                .unwrap()
                .push((request.clone(), Instant::now()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| page(&[], None))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn follows_tokens_with_delay_and_stops_at_three_pages() {
        let search = Arc::new(ScriptedSearch::new(vec![
            page(&["a"], Some("t1")),
            page(&["b"], Some("t2")),
            page(&["c"], Some("t3")),
            page(&["never"], None),
        ]));
        let mut collector = PlaceCollector::new(Arc::clone(&search), 2000.0, "cafe");

        let outcome = collector.collect_point(&GridPoint::new(1.0, 2.0)).await;

        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.observations, 3);
        assert!(!outcome.failed);
        assert!(collector.registry().get("never").is_none());

        let requests = search.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(matches!(
            &requests[0].0,
            SearchRequest::Nearby { place_type, radius_meters, .. }
                if place_type == "cafe" && (*radius_meters - 2000.0).abs() < f64::EPSILON
        ));
        assert_eq!(
            requests[1].0,
            SearchRequest::Continuation {
                token: "t1".to_owned()
            }
        );
        assert_eq!(
            requests[2].0,
            SearchRequest::Continuation {
                token: "t2".to_owned()
            }
        );
        assert!(requests[1].1 - requests[0].1 >= PAGE_TOKEN_DELAY);
        assert!(requests[2].1 - requests[1].1 >= PAGE_TOKEN_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn no_token_means_single_page_without_delay() {
        let search = Arc::new(ScriptedSearch::new(vec![page(&["a", "b"], None)]));
        let mut collector = PlaceCollector::new(search, 500.0, "cafe");

        let started = Instant::now();
        let outcome = collector.collect_point(&GridPoint::new(1.0, 2.0)).await;

        assert_eq!(outcome.pages, 1);
        assert_eq!(collector.registry().len(), 2);
        assert!(Instant::now() - started < PAGE_TOKEN_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_earlier_pages_and_continues_with_next_point() {
        let search = ScriptedSearch::new(vec![
            page(&["a", "b"], Some("t1")),
            failure(),
            page(&["c"], None),
        ]);
        let collector = PlaceCollector::new(search, 2000.0, "cafe");

        let points = [GridPoint::new(1.0, 2.0), GridPoint::new(1.1, 2.0)];
        let (registry, stats) = collector.collect(&points, &null_progress()).await;

        assert_eq!(registry.len(), 3);
        assert_eq!(stats.points, 2);
        assert_eq!(stats.failed_points, 1);
        assert_eq!(stats.pages, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_seed_request_yields_nothing_for_that_point() {
        let search = Arc::new(ScriptedSearch::new(vec![failure()]));
        let mut collector = PlaceCollector::new(Arc::clone(&search), 2000.0, "cafe");

        let outcome = collector.collect_point(&GridPoint::new(1.0, 2.0)).await;

        assert!(outcome.failed);
        assert_eq!(outcome.pages, 0);
        assert!(collector.registry().is_empty());
        assert_eq!(search.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_points_are_deduplicated() {
        let search = ScriptedSearch::new(vec![
            page(&["a", "b", "c"], None),
            page(&["b", "c", "d"], None),
            page(&["a", "d"], None),
        ]);
        let collector = PlaceCollector::new(search, 2000.0, "cafe");

        let points = [
            GridPoint::new(1.0, 2.0),
            GridPoint::new(1.02, 2.0),
            GridPoint::new(1.0, 2.02),
        ];
        let (registry, stats) = collector.collect(&points, &null_progress()).await;

        assert_eq!(registry.len(), 4);
        assert_eq!(stats.observations, 8);
        let ids: Vec<&str> = registry.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn registry_is_last_write_wins() {
        let mut registry = PlaceRegistry::new();
        assert!(registry.upsert(place("a", Some(3.0))));
        assert!(!registry.upsert(place("a", Some(4.5))));
        assert!(!registry.upsert(place("a", Some(4.5))));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().rating, Some(4.5));
    }
}
