//! Candidate selection for date courses

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::{Category, LocationRecord};

/// Course tag that marks a place as date-friendly
pub const DATE_TAG: &str = "date";

/// Minimum rating for a museum to qualify under the broad policy
pub const MUSEUM_MIN_RATING: f64 = 4.0;

/// Which places qualify as course candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FilterPolicy {
    /// Date-tagged places, every cafe and restaurant, and well rated museums
    DateTaggedBroad,
    /// Cafes, restaurants and viewpoints with coordinates and both region codes
    TypedAndGeotagged,
}

impl FilterPolicy {
    /// Whether `record` is a course candidate under this policy
    #[must_use]
    pub fn accepts(&self, record: &LocationRecord) -> bool {
        match self {
            FilterPolicy::DateTaggedBroad => {
                record.has_course_tag(DATE_TAG)
                    || matches!(record.category, Category::Cafe | Category::Food)
                    || (record.category == Category::Museum
                        && record.rating_or_zero() >= MUSEUM_MIN_RATING)
            }
            FilterPolicy::TypedAndGeotagged => {
                matches!(
                    record.category,
                    Category::Cafe | Category::Food | Category::View
                ) && record.lat.is_some()
                    && record.lng.is_some()
                    && record.region_code.is_some()
                    && record.subregion_code.is_some()
            }
        }
    }

    /// Categories the store can filter on server-side, if the policy is typed
    #[must_use]
    pub fn server_categories(&self) -> Option<Vec<Category>> {
        match self {
            FilterPolicy::DateTaggedBroad => None,
            FilterPolicy::TypedAndGeotagged => {
                Some(vec![Category::Cafe, Category::Food, Category::View])
            }
        }
    }

    /// Whether the store should drop rows without area/sigungu codes
    #[must_use]
    pub fn requires_region_codes(&self) -> bool {
        matches!(self, FilterPolicy::TypedAndGeotagged)
    }
}

impl std::fmt::Display for FilterPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FilterPolicy::DateTaggedBroad => "date_tagged_broad",
            FilterPolicy::TypedAndGeotagged => "typed_and_geotagged",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn place(category: Category) -> LocationRecord {
        LocationRecord::new("p", 37.5, 127.0, category).with_codes(Some(1), Some(1))
    }

    #[rstest]
    #[case(Category::Cafe, None, true)]
    #[case(Category::Food, None, true)]
    #[case(Category::Museum, Some(4.0), true)]
    #[case(Category::Museum, Some(3.9), false)]
    #[case(Category::Museum, None, false)]
    #[case(Category::View, Some(5.0), false)]
    #[case(Category::Other("SHOPPING".into()), Some(4.8), false)]
    fn test_broad_policy(
        #[case] category: Category,
        #[case] rating: Option<f64>,
        #[case] expected: bool,
    ) {
        let mut record = place(category);
        record.rating = rating;
        assert_eq!(FilterPolicy::DateTaggedBroad.accepts(&record), expected);
    }

    #[test]
    fn test_broad_policy_date_tag_overrides_category() {
        let mut record = place(Category::View);
        record.course_tags = Some(vec!["family".into(), DATE_TAG.into()]);
        assert!(FilterPolicy::DateTaggedBroad.accepts(&record));
    }

    #[rstest]
    #[case(Category::Cafe, true)]
    #[case(Category::Food, true)]
    #[case(Category::View, true)]
    #[case(Category::Museum, false)]
    fn test_typed_policy_categories(#[case] category: Category, #[case] expected: bool) {
        assert_eq!(FilterPolicy::TypedAndGeotagged.accepts(&place(category)), expected);
    }

    #[test]
    fn test_typed_policy_requires_codes_and_coordinates() {
        let no_subregion = place(Category::Cafe).with_codes(Some(1), None);
        assert!(!FilterPolicy::TypedAndGeotagged.accepts(&no_subregion));

        let no_region = place(Category::Cafe).with_codes(None, Some(3));
        assert!(!FilterPolicy::TypedAndGeotagged.accepts(&no_region));

        let mut no_lat = place(Category::Cafe);
        no_lat.lat = None;
        assert!(!FilterPolicy::TypedAndGeotagged.accepts(&no_lat));
    }

    #[test]
    fn test_typed_policy_ignores_date_tag() {
        let mut record = place(Category::Museum);
        record.course_tags = Some(vec![DATE_TAG.into()]);
        assert!(!FilterPolicy::TypedAndGeotagged.accepts(&record));
    }
}
