//! Read/write interface to the tabular store holding places and courses

pub mod memory;
pub mod supabase;

use async_trait::async_trait;

use crate::Result;
use crate::filter::FilterPolicy;
use crate::models::{Category, Course, CourseId, CourseStop, LocationRecord};

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

/// Server-side filter for the bulk place read.
///
/// Rows without coordinates are always excluded. Results are ordered by
/// area code, then sigungu code, then rating descending with missing ratings
/// last.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaceQuery {
    /// Restrict to these categories, if set
    pub categories: Option<Vec<Category>>,
    /// Drop rows missing either region code
    pub require_region_codes: bool,
    /// Maximum number of rows returned
    pub limit: Option<usize>,
}

impl PlaceQuery {
    /// The narrowest read that still returns every candidate of `policy`
    #[must_use]
    pub fn for_policy(policy: FilterPolicy, limit: Option<usize>) -> Self {
        Self {
            categories: policy.server_categories(),
            require_region_codes: policy.requires_region_codes(),
            limit,
        }
    }

    /// Whether a row passes the server-side filter
    #[must_use]
    pub fn matches(&self, record: &LocationRecord) -> bool {
        record.lat.is_some()
            && record.lng.is_some()
            && (!self.require_region_codes
                || (record.region_code.is_some() && record.subregion_code.is_some()))
            && self
                .categories
                .as_ref()
                .is_none_or(|allowed| allowed.contains(&record.category))
    }
}

/// Backend holding the places table and the two course output tables
#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Bulk read of places matching `query`, in store order
    async fn fetch_places(&self, query: &PlaceQuery) -> Result<Vec<LocationRecord>>;

    /// Remove every previously generated course and stop
    async fn clear_courses(&self) -> Result<()>;

    /// Insert one course row and return its generated id
    async fn insert_course(&self, course: &Course) -> Result<CourseId>;

    /// Insert the stops of a course
    async fn insert_stops(&self, course_id: &CourseId, stops: &[CourseStop]) -> Result<()>;

    /// Delete a single course row
    async fn delete_course(&self, course_id: &CourseId) -> Result<()>;
}
