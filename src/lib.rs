//! `datecourse` - distance-bounded date course generation
//!
//! Groups geotagged places by administrative region and strings them into
//! short walking courses with a greedy nearest-neighbour walk, so that no
//! place appears in two courses of the same run.

pub mod assembler;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod generator;
pub mod geo;
pub mod logging;
pub mod models;
pub mod region;
pub mod route;
pub mod store;

// Re-export core types for public API
pub use assembler::{CourseDraft, assemble, visit_duration_minutes};
pub use config::{CourseConfig, Profile};
pub use error::CourseError;
pub use filter::FilterPolicy;
pub use generator::{
    CourseGenerator, FailurePolicy, GenerationOutcome, GenerationReport, GenerationSettings,
};
pub use geo::{Coordinates, distance_km};
pub use models::{Category, Course, CourseId, CourseStop, LocationRecord, PlaceId};
pub use region::{Cluster, RegionKey, Subregion, classify, group_into_clusters};
pub use route::{ClaimSet, Route, RouteBuilder, RouteMode, RouteParams, build_routes};
pub use store::{CourseStore, MemoryStore, PlaceQuery, SupabaseStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, CourseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
