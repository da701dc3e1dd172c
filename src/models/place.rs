//! Place model for geotagged points-of-interest read from the places table

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::geo::Coordinates;

/// Opaque unique key of a place.
///
/// The places table has used both numeric and uuid keys over time, so both
/// JSON numbers and strings are accepted and normalised to text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaceId(#[serde(deserialize_with = "string_or_number")] String);

impl PlaceId {
    #[must_use]
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Place category tag (`type` column)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Cafe,
    Food,
    View,
    Museum,
    Other(String),
}

impl Category {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Category::Cafe => "CAFE",
            Category::Food => "FOOD",
            Category::View => "VIEW",
            Category::Museum => "MUSEUM",
            Category::Other(tag) => tag,
        }
    }

    /// Korean label used in course descriptions
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Category::Cafe => "카페",
            Category::Food => "맛집",
            Category::View => "전망대",
            Category::Museum => "문화시설",
            Category::Other(_) => "명소",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other(String::new())
    }
}

impl From<String> for Category {
    fn from(tag: String) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "CAFE" => Category::Cafe,
            "FOOD" => Category::Food,
            "VIEW" => Category::View,
            "MUSEUM" => Category::Museum,
            _ => Category::Other(tag),
        }
    }
}

impl From<&str> for Category {
    fn from(tag: &str) -> Self {
        Category::from(tag.to_string())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

/// A raw place row. Immutable once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: PlaceId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lng: Option<f64>,
    #[serde(rename = "type", default, deserialize_with = "category_or_other")]
    pub category: Category,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "area_code", default)]
    pub region_code: Option<i64>,
    #[serde(rename = "sigungu_code", default)]
    pub subregion_code: Option<i64>,
    /// Course tags such as `"date"`
    #[serde(rename = "course_type", default)]
    pub course_tags: Option<Vec<String>>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl LocationRecord {
    /// Create a minimal record with coordinates and a category
    #[must_use]
    pub fn new<S: Into<String>>(id: S, lat: f64, lng: f64, category: Category) -> Self {
        Self {
            id: PlaceId::new(id),
            name: None,
            lat: Some(lat),
            lng: Some(lng),
            category,
            rating: None,
            address: None,
            region_code: None,
            subregion_code: None,
            course_tags: None,
            image_url: None,
        }
    }

    #[must_use]
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    #[must_use]
    pub fn with_address<S: Into<String>>(mut self, address: S) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn with_codes(mut self, region_code: Option<i64>, subregion_code: Option<i64>) -> Self {
        self.region_code = region_code;
        self.subregion_code = subregion_code;
        self
    }

    #[must_use]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Coordinates, if both are present and finite
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(latitude), Some(longitude)) if latitude.is_finite() && longitude.is_finite() => {
                Some(Coordinates::new(latitude, longitude))
            }
            _ => None,
        }
    }

    /// Rating with the table's default of 0 for missing values
    #[must_use]
    pub fn rating_or_zero(&self) -> f64 {
        self.rating.filter(|r| r.is_finite()).unwrap_or(0.0)
    }

    #[must_use]
    pub fn has_course_tag(&self, tag: &str) -> bool {
        self.course_tags
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|t| t == tag))
    }

    /// Name for display, falling back to the id
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Integer(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

/// Numeric columns come back as numbers or numeric strings depending on the
/// column type; anything unparseable is treated as missing.
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

fn category_or_other<'de, D>(deserializer: D) -> std::result::Result<Category, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(Category::from)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_store_row() {
        let row = json!({
            "id": 42,
            "name": "카페 온더락",
            "lat": "37.4979",
            "lng": 127.0276,
            "type": "CAFE",
            "rating": null,
            "address": "서울특별시 강남구 테헤란로 1",
            "area_code": 1,
            "sigungu_code": 1,
            "course_type": ["date"],
            "image_url": null
        });

        let record: LocationRecord = serde_json::from_value(row).unwrap();
        assert_eq!(record.id, PlaceId::new("42"));
        assert_eq!(record.lat, Some(37.4979));
        assert_eq!(record.category, Category::Cafe);
        assert_eq!(record.rating_or_zero(), 0.0);
        assert!(record.has_course_tag("date"));
        assert!(record.coordinates().is_some());
    }

    #[test]
    fn test_missing_fields_default() {
        let record: LocationRecord =
            serde_json::from_value(json!({ "id": "a1b2", "type": null })).unwrap();
        assert_eq!(record.category, Category::Other(String::new()));
        assert!(record.coordinates().is_none());
        assert!(!record.has_course_tag("date"));
        assert_eq!(record.display_name(), "a1b2");
    }

    #[test]
    fn test_unparseable_coordinate_is_missing() {
        let record: LocationRecord =
            serde_json::from_value(json!({ "id": "x", "lat": "n/a", "lng": 127.0 })).unwrap();
        assert!(record.lat.is_none());
        assert!(record.coordinates().is_none());
    }

    #[test]
    fn test_category_roundtrip_tag() {
        assert_eq!(Category::from("museum"), Category::Museum);
        assert_eq!(Category::from("SHOPPING").as_str(), "SHOPPING");
        assert_eq!(String::from(Category::View), "VIEW");
    }
}
