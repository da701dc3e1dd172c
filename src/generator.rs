//! Course generation pipeline
//!
//! fetch → filter → group into clusters → build routes per cluster →
//! assemble → persist. Clusters never share candidates, so each gets its own
//! claim set and clusters can be routed concurrently.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info, instrument, warn};

use crate::Result;
use crate::assembler::{CourseDraft, assemble};
use crate::filter::FilterPolicy;
use crate::models::{CourseId, LocationRecord};
use crate::region::{Cluster, group_into_clusters};
use crate::route::{ClaimSet, RouteBuilder, RouteParams, build_routes};
use crate::store::{CourseStore, PlaceQuery};

/// Emit a progress event every this many persisted courses
const PROGRESS_INTERVAL: usize = 10;

/// What happens to a route's places when persisting its course fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Places return to the pool and may seed or join a later course
    #[default]
    Release,
    /// Places stay claimed for the rest of the run
    Retain,
}

/// Resolved settings of one generation run
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub filter_policy: FilterPolicy,
    pub route: RouteParams,
    pub fetch_limit: Option<usize>,
    pub failure_policy: FailurePolicy,
    /// Clusters processed at the same time during a persisted run
    pub concurrency: usize,
}

/// Summary of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub generated_at: DateTime<Utc>,
    pub places_fetched: usize,
    pub candidates: usize,
    pub clusters: usize,
    /// Clusters with fewer routable places than the minimum course length
    pub clusters_skipped: usize,
    pub courses_created: usize,
    /// Titles of courses whose persistence failed
    pub courses_failed: Vec<String>,
    pub per_region: BTreeMap<String, usize>,
}

impl GenerationReport {
    fn new(places_fetched: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            places_fetched,
            candidates: 0,
            clusters: 0,
            clusters_skipped: 0,
            courses_created: 0,
            courses_failed: Vec::new(),
            per_region: BTreeMap::new(),
        }
    }

    fn record(&mut self, draft: &CourseDraft) {
        self.courses_created += 1;
        *self
            .per_region
            .entry(draft.course.region_name.clone())
            .or_default() += 1;
    }
}

/// Report plus the courses it counts, in cluster order
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub report: GenerationReport,
    pub courses: Vec<CourseDraft>,
}

#[derive(Default)]
struct ClusterResult {
    created: Vec<CourseDraft>,
    failed: Vec<String>,
}

/// Runs the generation pipeline with fixed settings
pub struct CourseGenerator {
    settings: GenerationSettings,
}

impl CourseGenerator {
    #[must_use]
    pub fn new(settings: GenerationSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Keep the records the configured filter accepts, in input order
    #[must_use]
    pub fn select_candidates(&self, records: Vec<LocationRecord>) -> Vec<LocationRecord> {
        records
            .into_iter()
            .filter(|record| self.settings.filter_policy.accepts(record))
            .collect()
    }

    /// Read places from `store` with the narrowest query for the filter policy
    pub async fn fetch<S: CourseStore + ?Sized>(&self, store: &S) -> Result<Vec<LocationRecord>> {
        let query = PlaceQuery::for_policy(self.settings.filter_policy, self.settings.fetch_limit);
        store.fetch_places(&query).await
    }

    /// Plan courses without persisting anything
    #[must_use]
    pub fn plan(&self, records: Vec<LocationRecord>) -> GenerationOutcome {
        let (mut report, clusters) = self.prepare(records);
        let params = &self.settings.route;

        let planned: Vec<Vec<CourseDraft>> = clusters
            .par_iter()
            .filter(|cluster| self.is_routable(cluster))
            .map(|cluster| {
                let mut claims = ClaimSet::new();
                build_routes(&cluster.members, params, &mut claims)
                    .iter()
                    .enumerate()
                    .map(|(i, route)| assemble(route, cluster, i + 1))
                    .collect()
            })
            .collect();

        let courses: Vec<CourseDraft> = planned.into_iter().flatten().collect();
        for draft in &courses {
            report.record(draft);
        }

        info!(
            "Planned {} courses from {} clusters",
            report.courses_created, report.clusters
        );
        GenerationOutcome { report, courses }
    }

    /// Replace the store's courses with freshly generated ones
    #[instrument(
        skip(self, store),
        fields(policy = %self.settings.filter_policy, mode = %self.settings.route.mode)
    )]
    pub async fn run<S: CourseStore + ?Sized>(&self, store: &S) -> Result<GenerationOutcome> {
        info!("Starting date course generation");

        // read before clearing so a failed fetch leaves the old courses intact
        let records = self.fetch(store).await?;
        if records.is_empty() {
            warn!("No places matched the place query");
        }

        let (mut report, clusters) = self.prepare(records);

        store.clear_courses().await?;
        info!("Cleared previous courses");

        let progress = AtomicUsize::new(0);
        let results: Vec<ClusterResult> = stream::iter(
            clusters
                .iter()
                .filter(|cluster| self.is_routable(cluster)),
        )
        .map(|cluster| self.process_cluster(store, cluster, &progress))
        .buffered(self.settings.concurrency.max(1))
        .collect()
        .await;

        let mut courses = Vec::new();
        for result in results {
            for draft in &result.created {
                report.record(draft);
            }
            courses.extend(result.created);
            report.courses_failed.extend(result.failed);
        }

        info!(
            "Generated {} courses ({} failed) from {} places",
            report.courses_created,
            report.courses_failed.len(),
            report.candidates
        );
        Ok(GenerationOutcome { report, courses })
    }

    fn prepare(&self, records: Vec<LocationRecord>) -> (GenerationReport, Vec<Cluster>) {
        let mut report = GenerationReport::new(records.len());

        let candidates = self.select_candidates(records);
        report.candidates = candidates.len();
        debug!(
            "{} of {} places are candidates",
            report.candidates, report.places_fetched
        );

        let clusters = group_into_clusters(candidates);
        report.clusters = clusters.len();
        report.clusters_skipped = clusters
            .iter()
            .filter(|cluster| !self.is_routable(cluster))
            .count();

        (report, clusters)
    }

    fn is_routable(&self, cluster: &Cluster) -> bool {
        let routable = cluster
            .members
            .iter()
            .filter(|member| member.coordinates().is_some())
            .count();
        routable >= self.settings.route.min_stops
    }

    async fn process_cluster<S: CourseStore + ?Sized>(
        &self,
        store: &S,
        cluster: &Cluster,
        progress: &AtomicUsize,
    ) -> ClusterResult {
        let mut result = ClusterResult::default();
        let mut builder =
            RouteBuilder::new(&cluster.members, self.settings.route.clone(), ClaimSet::new());

        while let Some(route) = builder.next() {
            let draft = assemble(&route, cluster, result.created.len() + 1);

            match persist(store, &draft).await {
                Ok(id) => {
                    debug!("Created course {} ({})", draft.course.title, id);
                    let total = progress.fetch_add(1, Ordering::Relaxed) + 1;
                    if total % PROGRESS_INTERVAL == 0 {
                        info!("{} courses created", total);
                    }
                    result.created.push(draft);
                }
                Err(e) => {
                    error!("Failed to create course {}: {}", draft.course.title, e);
                    if self.settings.failure_policy == FailurePolicy::Release {
                        builder.release(&route);
                    }
                    result.failed.push(draft.course.title);
                }
            }
        }

        result
    }
}

/// Insert a course and its stops, removing the course row again if the stops
/// cannot be written
async fn persist<S: CourseStore + ?Sized>(store: &S, draft: &CourseDraft) -> Result<CourseId> {
    let id = store.insert_course(&draft.course).await?;

    if let Err(e) = store.insert_stops(&id, &draft.stops).await {
        if let Err(cleanup) = store.delete_course(&id).await {
            warn!("Could not remove course {} without stops: {}", id, cleanup);
        }
        return Err(e);
    }

    Ok(id)
}
