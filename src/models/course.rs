//! Course and course stop records produced by a generation run

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use super::place::{Category, PlaceId};
use crate::geo::round_km;
use crate::region::Subregion;

/// Store-generated course identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseId(#[serde(deserialize_with = "super::place::string_or_number")] String);

impl CourseId {
    #[must_use]
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A course row. Field names follow the `date_courses` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub title: String,
    #[serde(rename = "region")]
    pub region_name: String,
    #[serde(rename = "area_code")]
    pub region_code: Option<i64>,
    #[serde(rename = "sigungu_code")]
    pub subregion_code: Option<i64>,
    #[serde(rename = "sigungu_name")]
    pub subregion_name: Option<String>,
    pub course_type: String,
    pub description: String,
    pub image_url: Option<String>,
    #[serde(rename = "place_count")]
    pub stop_count: usize,
    pub duration: String,
    #[serde(serialize_with = "rounded_km")]
    pub total_distance_km: f64,
    #[serde(rename = "max_distance_km", serialize_with = "rounded_km")]
    pub max_hop_km: f64,
}

impl Course {
    /// The subregion this course was grouped under: the numeric code when the
    /// places carried one, otherwise the name parsed from their address.
    #[must_use]
    pub fn subregion_identifier(&self) -> Option<Subregion> {
        self.subregion_code
            .map(Subregion::Code)
            .or_else(|| self.subregion_name.clone().map(Subregion::Name))
    }
}

/// One stop of a course
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseStop {
    pub place_id: PlaceId,
    pub order_index: usize,
    #[serde(serialize_with = "rounded_km")]
    pub distance_from_previous_km: f64,
    pub visit_duration_minutes: u32,
    #[serde(skip)]
    pub place_name: String,
    #[serde(skip)]
    pub category: Category,
}

/// Stop row as written to the `date_course_places` table
#[derive(Debug, Serialize)]
pub struct CourseStopRow<'a> {
    #[serde(rename = "date_course_id")]
    pub course_id: &'a CourseId,
    #[serde(flatten)]
    pub stop: &'a CourseStop,
}

fn rounded_km<S: Serializer>(km: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_km(*km))
}
