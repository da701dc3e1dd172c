//! Data models for the course generator
//!
//! - Place: geotagged points-of-interest read from the store
//! - Course: generated courses and their ordered stops

pub mod course;
pub mod place;

pub use course::{Course, CourseId, CourseStop, CourseStopRow};
pub use place::{Category, LocationRecord, PlaceId};
