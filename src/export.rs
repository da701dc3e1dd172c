//! JSON export of generated courses
//!
//! The file layout is `{"date_courses": [...]}` with each course carrying its
//! stops as a nested `places` array, the format the course import tooling
//! reads.

use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::Result;
use crate::assembler::CourseDraft;
use crate::geo::round_km;
use crate::models::{Category, Course};

#[derive(Debug, Serialize)]
struct ExportFile<'a> {
    date_courses: Vec<ExportCourse<'a>>,
}

#[derive(Debug, Serialize)]
struct ExportCourse<'a> {
    #[serde(flatten)]
    course: &'a Course,
    places: Vec<ExportPlace<'a>>,
}

#[derive(Debug, Serialize)]
struct ExportPlace<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    category: &'a str,
    order_index: usize,
    visit_duration_minutes: u32,
    distance_from_previous_km: f64,
}

/// Category tag used in exports; anything unrecognised is `ETC`
fn export_tag(category: &Category) -> &str {
    match category {
        Category::Other(_) => "ETC",
        known => known.as_str(),
    }
}

/// Render courses as a pretty-printed JSON document
pub fn to_json(courses: &[CourseDraft]) -> Result<String> {
    let file = ExportFile {
        date_courses: courses
            .iter()
            .map(|draft| ExportCourse {
                course: &draft.course,
                places: draft
                    .stops
                    .iter()
                    .map(|stop| ExportPlace {
                        name: &stop.place_name,
                        category: export_tag(&stop.category),
                        order_index: stop.order_index,
                        visit_duration_minutes: stop.visit_duration_minutes,
                        distance_from_previous_km: round_km(stop.distance_from_previous_km),
                    })
                    .collect(),
            })
            .collect(),
    };

    Ok(serde_json::to_string_pretty(&file)?)
}

/// Write courses to `path`, replacing any existing file
pub fn write_courses<P: AsRef<Path>>(path: P, courses: &[CourseDraft]) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, to_json(courses)?)?;
    info!("Exported {} courses to {}", courses.len(), path.display());
    Ok(())
}
