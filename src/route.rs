//! Greedy nearest-neighbour course construction
//!
//! A walk starts at a seed place and repeatedly moves to the nearest
//! unvisited, unclaimed place within `max_hop_km` of the current stop, until
//! `max_stops` is reached or nothing is in range. Walks shorter than
//! `min_stops` are discarded whole. Accepted walks claim their places so no
//! later walk in the same cluster can reuse them.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, trace};

use crate::geo::Coordinates;
use crate::models::{LocationRecord, PlaceId};

/// How many routes are attempted per cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RouteMode {
    /// One walk from the best rated place
    Single,
    /// One walk per top-rated seed until the seed scan is exhausted
    Multi,
}

impl std::fmt::Display for RouteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RouteMode::Single => "single",
            RouteMode::Multi => "multi",
        })
    }
}

/// Parameters of a route-building pass
#[derive(Debug, Clone, PartialEq)]
pub struct RouteParams {
    pub max_hop_km: f64,
    pub min_stops: usize,
    pub max_stops: usize,
    pub mode: RouteMode,
    /// Number of top-rated places tried as seeds in multi mode
    pub seed_scan_limit: usize,
}

/// Place ids consumed by accepted routes within one cluster
#[derive(Debug, Clone, Default)]
pub struct ClaimSet {
    ids: HashSet<PlaceId>,
}

impl ClaimSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, id: &PlaceId) -> bool {
        self.ids.contains(id)
    }

    /// Claim every stop of `route`
    pub fn claim(&mut self, route: &Route<'_>) {
        self.ids.extend(route.place_ids().cloned());
    }

    /// Return every stop of `route` to the pool
    pub fn release(&mut self, route: &Route<'_>) {
        for id in route.place_ids() {
            self.ids.remove(id);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// An accepted, ordered stop sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Route<'a> {
    stops: Vec<&'a LocationRecord>,
    /// `hops_km[i]` is the distance from `stops[i]` to `stops[i + 1]`
    hops_km: Vec<f64>,
}

impl<'a> Route<'a> {
    #[must_use]
    pub fn stops(&self) -> &[&'a LocationRecord] {
        &self.stops
    }

    #[must_use]
    pub fn hops_km(&self) -> &[f64] {
        &self.hops_km
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    #[must_use]
    pub fn total_distance_km(&self) -> f64 {
        self.hops_km.iter().sum()
    }

    #[must_use]
    pub fn max_hop_km(&self) -> f64 {
        self.hops_km.iter().copied().fold(0.0, f64::max)
    }

    pub fn place_ids(&self) -> impl Iterator<Item = &PlaceId> {
        self.stops.iter().map(|stop| &stop.id)
    }
}

struct Candidate<'a> {
    record: &'a LocationRecord,
    at: Coordinates,
}

/// Produces the accepted routes of one cluster, in acceptance order.
///
/// Routes are handed out one at a time so the caller can persist each before
/// the next seed is tried, and [`RouteBuilder::release`] a route whose
/// persistence failed.
pub struct RouteBuilder<'a> {
    pool: Vec<Candidate<'a>>,
    seeds: Vec<usize>,
    cursor: usize,
    params: RouteParams,
    claims: ClaimSet,
}

impl<'a> RouteBuilder<'a> {
    /// Prepare a builder over `cluster`. Members without coordinates are left
    /// out of the candidate pool.
    #[must_use]
    pub fn new(cluster: &'a [LocationRecord], params: RouteParams, claims: ClaimSet) -> Self {
        let mut pool: Vec<Candidate<'a>> = cluster
            .iter()
            .filter_map(|record| record.coordinates().map(|at| Candidate { record, at }))
            .collect();

        if pool.len() < cluster.len() {
            debug!(
                "Ignoring {} places without coordinates",
                cluster.len() - pool.len()
            );
        }

        let seeds = if pool.is_empty() || pool.len() < params.min_stops {
            Vec::new()
        } else {
            match params.mode {
                RouteMode::Single => best_rated(&pool, &claims).into_iter().collect(),
                RouteMode::Multi => {
                    // stable: equal ratings keep input order
                    pool.sort_by(|a, b| {
                        b.record.rating_or_zero().total_cmp(&a.record.rating_or_zero())
                    });
                    (0..pool.len().min(params.seed_scan_limit)).collect()
                }
            }
        };

        Self {
            pool,
            seeds,
            cursor: 0,
            params,
            claims,
        }
    }

    #[must_use]
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// Un-claim a previously returned route so later walks may use its places
    pub fn release(&mut self, route: &Route<'_>) {
        self.claims.release(route);
    }

    #[must_use]
    pub fn into_claims(self) -> ClaimSet {
        self.claims
    }

    /// Grow a walk from `seed`, returning pool indices and hop distances
    fn grow(&self, seed: usize) -> (Vec<usize>, Vec<f64>) {
        let mut picked = vec![seed];
        let mut visited: HashSet<&PlaceId> = HashSet::from([&self.pool[seed].record.id]);
        let mut hops = Vec::new();
        let mut current = seed;

        while picked.len() < self.params.max_stops {
            let mut nearest: Option<(usize, f64)> = None;

            for (i, candidate) in self.pool.iter().enumerate() {
                let id = &candidate.record.id;
                if visited.contains(id) || self.claims.contains(id) {
                    continue;
                }

                let distance = self.pool[current].at.distance_to(&candidate.at);
                if distance <= self.params.max_hop_km
                    && nearest.is_none_or(|(_, best)| distance < best)
                {
                    nearest = Some((i, distance));
                }
            }

            let Some((next, distance)) = nearest else {
                break;
            };

            trace!(
                "Hop {} -> {} ({:.3} km)",
                self.pool[current].record.id, self.pool[next].record.id, distance
            );
            visited.insert(&self.pool[next].record.id);
            picked.push(next);
            hops.push(distance);
            current = next;
        }

        (picked, hops)
    }
}

impl<'a> Iterator for RouteBuilder<'a> {
    type Item = Route<'a>;

    fn next(&mut self) -> Option<Route<'a>> {
        while self.cursor < self.seeds.len() {
            let seed = self.seeds[self.cursor];
            self.cursor += 1;

            if self.claims.contains(&self.pool[seed].record.id) {
                continue;
            }

            let (picked, hops_km) = self.grow(seed);
            if picked.len() < self.params.min_stops {
                debug!(
                    "Discarding walk from {}: {} stops, need {}",
                    self.pool[seed].record.id,
                    picked.len(),
                    self.params.min_stops
                );
                continue;
            }

            let route = Route {
                stops: picked.iter().map(|&i| self.pool[i].record).collect(),
                hops_km,
            };
            self.claims.claim(&route);
            return Some(route);
        }

        None
    }
}

/// Highest rated unclaimed candidate; the first one wins ties
fn best_rated(pool: &[Candidate<'_>], claims: &ClaimSet) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in pool.iter().enumerate() {
        if claims.contains(&candidate.record.id) {
            continue;
        }
        let rating = candidate.record.rating_or_zero();
        if best.is_none_or(|(_, top)| rating > top) {
            best = Some((i, rating));
        }
    }
    best.map(|(i, _)| i)
}

/// Build every accepted route of `cluster`, threading `claims` through.
///
/// On return `claims` holds the ids it started with plus every id of the
/// returned routes.
pub fn build_routes<'a>(
    cluster: &'a [LocationRecord],
    params: &RouteParams,
    claims: &mut ClaimSet,
) -> Vec<Route<'a>> {
    let mut builder = RouteBuilder::new(cluster, params.clone(), std::mem::take(claims));
    let routes: Vec<Route<'a>> = builder.by_ref().collect();
    *claims = builder.into_claims();
    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::EARTH_RADIUS_KM;
    use crate::models::Category;

    const BASE_LAT: f64 = 37.5;
    const BASE_LNG: f64 = 127.0;

    /// Latitude `km` kilometers north of the base point along its meridian
    fn north(km: f64) -> f64 {
        BASE_LAT + (km / EARTH_RADIUS_KM).to_degrees()
    }

    fn cafe(id: &str, km_north: f64, rating: f64) -> LocationRecord {
        LocationRecord::new(id, north(km_north), BASE_LNG, Category::Cafe).with_rating(rating)
    }

    fn params(min_stops: usize, max_stops: usize, mode: RouteMode) -> RouteParams {
        RouteParams {
            max_hop_km: 5.0,
            min_stops,
            max_stops,
            mode,
            seed_scan_limit: 20,
        }
    }

    fn ids(route: &Route<'_>) -> Vec<String> {
        route.place_ids().map(|id| id.to_string()).collect()
    }

    fn line_cluster() -> Vec<LocationRecord> {
        vec![
            cafe("seed", 0.0, 5.0),
            cafe("far", 10.0, 4.0),
            cafe("b", 1.5, 4.0),
            cafe("a", 1.0, 4.0),
        ]
    }

    #[test]
    fn test_nearest_first_walk_stops_at_threshold() {
        let cluster = line_cluster();
        let mut claims = ClaimSet::new();
        let routes = build_routes(&cluster, &params(3, 4, RouteMode::Single), &mut claims);

        assert_eq!(routes.len(), 1);
        assert_eq!(ids(&routes[0]), vec!["seed", "a", "b"]);
        assert_eq!(routes[0].hops_km().len(), 2);
        assert!((routes[0].hops_km()[0] - 1.0).abs() < 1e-9);
        assert!((routes[0].hops_km()[1] - 0.5).abs() < 1e-9);
        assert!((routes[0].total_distance_km() - 1.5).abs() < 1e-9);
        assert!((routes[0].max_hop_km() - 1.0).abs() < 1e-9);
        assert_eq!(claims.len(), 3);
    }

    #[test]
    fn test_short_walk_is_discarded_whole() {
        let cluster = line_cluster();
        let mut claims = ClaimSet::new();
        let routes = build_routes(&cluster, &params(4, 4, RouteMode::Single), &mut claims);

        assert!(routes.is_empty());
        assert!(claims.is_empty());
    }

    #[test]
    fn test_picks_globally_nearest_not_first_in_range() {
        let cluster = vec![
            cafe("seed", 0.0, 5.0),
            cafe("in_range_first", 4.0, 1.0),
            cafe("nearest", 0.3, 1.0),
            cafe("third", 4.2, 1.0),
        ];
        let routes = build_routes(
            &cluster,
            &params(2, 2, RouteMode::Single),
            &mut ClaimSet::new(),
        );
        assert_eq!(ids(&routes[0]), vec!["seed", "nearest"]);
    }

    #[test]
    fn test_equal_distance_keeps_first_encountered() {
        // twins sit at the same spot, so the hop distances are identical
        let cluster = vec![
            cafe("seed", 0.0, 5.0),
            cafe("twin_one", 1.0, 1.0),
            cafe("twin_two", 1.0, 1.0),
        ];
        let routes = build_routes(
            &cluster,
            &params(2, 2, RouteMode::Single),
            &mut ClaimSet::new(),
        );
        assert_eq!(ids(&routes[0]), vec!["seed", "twin_one"]);
    }

    #[test]
    fn test_hop_equal_to_threshold_is_admissible() {
        let cluster = vec![cafe("seed", 0.0, 5.0), cafe("edge", 2.0, 1.0)];
        let exact = cluster[0]
            .coordinates()
            .unwrap()
            .distance_to(&cluster[1].coordinates().unwrap());
        let mut p = params(2, 2, RouteMode::Single);
        p.max_hop_km = exact;

        let routes = build_routes(&cluster, &p, &mut ClaimSet::new());
        assert_eq!(routes.len(), 1);

        p.max_hop_km = exact * 0.999;
        assert!(build_routes(&cluster, &p, &mut ClaimSet::new()).is_empty());
    }

    #[test]
    fn test_cluster_one_short_of_min_produces_nothing() {
        let cluster = vec![cafe("a", 0.0, 5.0), cafe("b", 0.1, 4.0)];
        let mut claims = ClaimSet::new();
        assert!(build_routes(&cluster, &params(3, 4, RouteMode::Multi), &mut claims).is_empty());
        assert!(build_routes(&cluster, &params(3, 4, RouteMode::Single), &mut claims).is_empty());
    }

    #[test]
    fn test_empty_cluster() {
        let mut claims = ClaimSet::new();
        assert!(build_routes(&[], &params(3, 4, RouteMode::Multi), &mut claims).is_empty());
    }

    #[test]
    fn test_missing_coordinates_are_skipped_not_fatal() {
        let mut broken = cafe("broken", 0.05, 9.9);
        broken.lat = None;
        let cluster = vec![
            broken,
            cafe("seed", 0.0, 5.0),
            cafe("a", 0.5, 4.0),
            cafe("b", 1.0, 3.0),
        ];

        let routes = build_routes(
            &cluster,
            &params(3, 4, RouteMode::Single),
            &mut ClaimSet::new(),
        );
        assert_eq!(routes.len(), 1);
        assert_eq!(ids(&routes[0]), vec!["seed", "a", "b"]);
    }

    #[test]
    fn test_single_mode_seed_tie_uses_input_order() {
        let cluster = vec![
            cafe("first", 0.0, 4.5),
            cafe("second", 0.2, 4.5),
            cafe("low", 0.4, 1.0),
        ];
        let routes = build_routes(
            &cluster,
            &params(3, 3, RouteMode::Single),
            &mut ClaimSet::new(),
        );
        assert_eq!(ids(&routes[0]), vec!["first", "second", "low"]);
    }

    #[test]
    fn test_max_stops_caps_route() {
        let cluster: Vec<LocationRecord> = (0..8)
            .map(|i| cafe(&format!("p{i}"), f64::from(i) * 0.2, 8.0 - f64::from(i)))
            .collect();
        let routes = build_routes(
            &cluster,
            &params(3, 4, RouteMode::Single),
            &mut ClaimSet::new(),
        );
        assert_eq!(routes.len(), 1);
        assert_eq!(ids(&routes[0]), vec!["p0", "p1", "p2", "p3"]);
    }

    #[test]
    fn test_multi_mode_routes_are_disjoint() {
        // two groups of four, 20 km apart
        let mut cluster: Vec<LocationRecord> = (0..4)
            .map(|i| cafe(&format!("north{i}"), 20.0 + f64::from(i) * 0.3, 4.0))
            .collect();
        cluster.extend((0..4).map(|i| cafe(&format!("south{i}"), f64::from(i) * 0.3, 4.5)));

        let mut claims = ClaimSet::new();
        let routes = build_routes(&cluster, &params(2, 2, RouteMode::Multi), &mut claims);

        assert_eq!(routes.len(), 4);
        let mut seen = HashSet::new();
        for route in &routes {
            assert_eq!(route.len(), 2);
            for id in route.place_ids() {
                assert!(seen.insert(id.clone()), "{id} used twice");
            }
            assert!(route.max_hop_km() <= 5.0);
        }
        assert_eq!(claims.len(), 8);
        // higher rated south group is seeded first
        assert!(ids(&routes[0])[0].starts_with("south"));
    }

    #[test]
    fn test_multi_mode_seed_scan_limit() {
        let cluster: Vec<LocationRecord> = (0..6)
            .map(|i| cafe(&format!("p{i}"), f64::from(i) * 50.0, 6.0 - f64::from(i)))
            .chain((0..6).map(|i| cafe(&format!("q{i}"), f64::from(i) * 50.0 + 0.1, 0.0)))
            .collect();
        let mut p = params(2, 2, RouteMode::Multi);
        p.seed_scan_limit = 3;

        let routes = build_routes(&cluster, &p, &mut ClaimSet::new());
        assert_eq!(routes.len(), 3);
    }

    #[test]
    fn test_release_returns_places_to_pool() {
        let cluster = vec![
            cafe("s1", 0.0, 5.0),
            cafe("s2", 0.1, 4.0),
            cafe("s3", 0.3, 3.0),
        ];
        let mut builder =
            RouteBuilder::new(&cluster, params(2, 2, RouteMode::Multi), ClaimSet::new());

        let first = builder.next().unwrap();
        assert_eq!(ids(&first), vec!["s1", "s2"]);
        builder.release(&first);

        // s2 is the next seed and may now pair with s1 again
        let second = builder.next().unwrap();
        assert_eq!(ids(&second), vec!["s2", "s1"]);
        assert!(builder.next().is_none());
    }

    #[test]
    fn test_retained_claims_block_reuse() {
        let cluster = vec![
            cafe("s1", 0.0, 5.0),
            cafe("s2", 0.1, 4.0),
            cafe("s3", 0.3, 3.0),
        ];
        let mut builder =
            RouteBuilder::new(&cluster, params(2, 2, RouteMode::Multi), ClaimSet::new());

        assert_eq!(ids(&builder.next().unwrap()), vec!["s1", "s2"]);
        // s3 has nobody left to pair with
        assert!(builder.next().is_none());
        assert_eq!(builder.claims().len(), 2);
    }

    #[test]
    fn test_preexisting_claims_are_respected() {
        let cluster = line_cluster();
        let mut claims = ClaimSet::new();
        let blocker = Route {
            stops: vec![&cluster[3]],
            hops_km: vec![],
        };
        claims.claim(&blocker);

        let routes = build_routes(&cluster, &params(2, 4, RouteMode::Single), &mut claims);
        assert_eq!(ids(&routes[0]), vec!["seed", "b"]);
        assert!(claims.contains(&PlaceId::new("a")));
    }
}
