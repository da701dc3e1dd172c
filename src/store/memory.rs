//! In-process store backend, used for offline runs and tests

use async_trait::async_trait;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{CourseStore, PlaceQuery};
use crate::models::{Course, CourseId, CourseStop, LocationRecord};
use crate::{CourseError, Result};

#[derive(Debug, Default)]
struct Tables {
    places: Vec<LocationRecord>,
    courses: Vec<(CourseId, Course)>,
    stops: Vec<(CourseId, CourseStop)>,
    next_id: u64,
}

/// Store backed by `Mutex`-guarded vectors
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `places`
    #[must_use]
    pub fn with_places(places: Vec<LocationRecord>) -> Self {
        Self {
            tables: Mutex::new(Tables {
                places,
                ..Tables::default()
            }),
        }
    }

    /// Load places from a JSON array of place rows
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let places: Vec<LocationRecord> = serde_json::from_str(&content)?;
        info!("Loaded {} places from {}", places.len(), path.display());
        Ok(Self::with_places(places))
    }

    /// Courses currently stored, in insertion order
    #[must_use]
    pub fn courses(&self) -> Vec<(CourseId, Course)> {
        self.lock().map(|t| t.courses.clone()).unwrap_or_default()
    }

    /// Stops of one course, in insertion order
    #[must_use]
    pub fn stops_for(&self, course_id: &CourseId) -> Vec<CourseStop> {
        self.lock()
            .map(|t| {
                t.stops
                    .iter()
                    .filter(|(owner, _)| owner == course_id)
                    .map(|(_, stop)| stop.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.lock().map(|t| t.stops.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| CourseError::store("memory store lock poisoned"))
    }
}

/// Area code, then sigungu code, both ascending with missing codes last as
/// in a PostgreSQL ascending sort, then rating descending with nulls last
fn store_order(a: &LocationRecord, b: &LocationRecord) -> Ordering {
    nulls_last(a.region_code, b.region_code)
        .then(nulls_last(a.subregion_code, b.subregion_code))
        .then_with(|| match (a.rating, b.rating) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

fn nulls_last(a: Option<i64>, b: Option<i64>) -> Ordering {
    a.is_none().cmp(&b.is_none()).then(a.cmp(&b))
}

#[async_trait]
impl CourseStore for MemoryStore {
    async fn fetch_places(&self, query: &PlaceQuery) -> Result<Vec<LocationRecord>> {
        let tables = self.lock()?;
        let mut places: Vec<LocationRecord> = tables
            .places
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        places.sort_by(store_order);
        if let Some(limit) = query.limit {
            places.truncate(limit);
        }
        debug!("Memory store returned {} places", places.len());
        Ok(places)
    }

    async fn clear_courses(&self) -> Result<()> {
        let mut tables = self.lock()?;
        tables.stops.clear();
        tables.courses.clear();
        Ok(())
    }

    async fn insert_course(&self, course: &Course) -> Result<CourseId> {
        let mut tables = self.lock()?;
        tables.next_id += 1;
        let id = CourseId::new(tables.next_id.to_string());
        tables.courses.push((id.clone(), course.clone()));
        Ok(id)
    }

    async fn insert_stops(&self, course_id: &CourseId, stops: &[CourseStop]) -> Result<()> {
        let mut tables = self.lock()?;
        if !tables.courses.iter().any(|(id, _)| id == course_id) {
            return Err(CourseError::store(format!(
                "course {course_id} does not exist"
            )));
        }
        tables
            .stops
            .extend(stops.iter().map(|stop| (course_id.clone(), stop.clone())));
        Ok(())
    }

    async fn delete_course(&self, course_id: &CourseId) -> Result<()> {
        let mut tables = self.lock()?;
        tables.stops.retain(|(owner, _)| owner != course_id);
        tables.courses.retain(|(id, _)| id != course_id);
        Ok(())
    }
}
