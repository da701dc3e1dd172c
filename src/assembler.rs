//! Turns accepted routes into course and stop records

use crate::models::{Category, Course, CourseStop};
use crate::region::Cluster;
use crate::route::Route;

pub const COURSE_TYPE: &str = "date";
pub const COURSE_DURATION: &str = "당일 코스";

/// Estimated dwell time at a stop
#[must_use]
pub fn visit_duration_minutes(category: &Category) -> u32 {
    match category {
        Category::Cafe => 60,
        Category::Food => 90,
        _ => 45,
    }
}

/// A course and its stops, ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDraft {
    pub course: Course,
    pub stops: Vec<CourseStop>,
}

/// Build the records for the `ordinal`-th (1-based) course of `cluster`
#[must_use]
pub fn assemble(route: &Route<'_>, cluster: &Cluster, ordinal: usize) -> CourseDraft {
    let label = cluster.label();

    let stops: Vec<CourseStop> = route
        .stops()
        .iter()
        .enumerate()
        .map(|(order_index, place)| CourseStop {
            place_id: place.id.clone(),
            order_index,
            distance_from_previous_km: order_index
                .checked_sub(1)
                .map_or(0.0, |hop| route.hops_km()[hop]),
            visit_duration_minutes: visit_duration_minutes(&place.category),
            place_name: place.display_name().to_string(),
            category: place.category.clone(),
        })
        .collect();

    let course = Course {
        title: course_title(label, ordinal),
        region_name: cluster.key.region_name.to_string(),
        region_code: cluster.region_code,
        subregion_code: cluster.subregion_code(),
        subregion_name: cluster.subregion_name.clone(),
        course_type: COURSE_TYPE.to_string(),
        description: describe(label, &stops),
        image_url: route.stops().first().and_then(|p| p.image_url.clone()),
        stop_count: stops.len(),
        duration: COURSE_DURATION.to_string(),
        total_distance_km: route.total_distance_km(),
        max_hop_km: route.max_hop_km(),
    };

    CourseDraft { course, stops }
}

fn course_title(label: &str, ordinal: usize) -> String {
    if ordinal >= 2 {
        format!("{label} 데이트 코스 {ordinal}")
    } else {
        format!("{label} 데이트 코스")
    }
}

fn describe(label: &str, stops: &[CourseStop]) -> String {
    let mut labels: Vec<&str> = Vec::new();
    for stop in stops {
        let name = stop.category.label();
        if !labels.contains(&name) {
            labels.push(name);
        }
    }

    let listed = labels.join(", ");
    let particle = object_particle(&listed);
    format!("{label}의 {listed}{particle} 포함한 당일 데이트 코스입니다.")
}

/// 을 after a final consonant, 를 otherwise
fn object_particle(word: &str) -> &'static str {
    match word.chars().last() {
        Some(c @ '가'..='힣') if (u32::from(c) - 0xAC00) % 28 != 0 => "을",
        _ => "를",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::EARTH_RADIUS_KM;
    use crate::models::LocationRecord;
    use crate::region::group_into_clusters;
    use crate::route::{ClaimSet, RouteMode, RouteParams, build_routes};
    use rstest::rstest;

    fn at_km(id: &str, km: f64, category: Category) -> LocationRecord {
        LocationRecord::new(id, 37.5 + (km / EARTH_RADIUS_KM).to_degrees(), 127.0, category)
            .with_codes(Some(1), Some(1))
            .with_address("서울특별시 강남구 테헤란로")
    }

    fn params() -> RouteParams {
        RouteParams {
            max_hop_km: 3.0,
            min_stops: 3,
            max_stops: 4,
            mode: RouteMode::Single,
            seed_scan_limit: 20,
        }
    }

    #[rstest]
    #[case(Category::Cafe, 60)]
    #[case(Category::Food, 90)]
    #[case(Category::View, 45)]
    #[case(Category::Museum, 45)]
    #[case(Category::Other("SHOP".into()), 45)]
    fn test_visit_duration(#[case] category: Category, #[case] minutes: u32) {
        assert_eq!(visit_duration_minutes(&category), minutes);
    }

    #[test]
    fn test_assemble_course_and_stops() {
        let mut first = at_km("c1", 0.0, Category::Cafe).with_rating(5.0);
        first.image_url = Some("https://img.example/c1.jpg".to_string());
        let places = vec![
            first,
            at_km("f1", 1.0, Category::Food),
            at_km("v1", 2.5, Category::View),
        ];
        let clusters = group_into_clusters(places);
        let cluster = &clusters[0];
        let routes = build_routes(&cluster.members, &params(), &mut ClaimSet::new());

        let draft = assemble(&routes[0], cluster, 1);
        let course = &draft.course;
        assert_eq!(course.title, "강남구 데이트 코스");
        assert_eq!(course.region_name, "서울");
        assert_eq!(course.subregion_code, Some(1));
        assert_eq!(course.stop_count, 3);
        assert_eq!(course.image_url.as_deref(), Some("https://img.example/c1.jpg"));
        assert!((course.total_distance_km - 2.5).abs() < 1e-9);
        assert!((course.max_hop_km - 1.5).abs() < 1e-9);
        assert_eq!(
            course.description,
            "강남구의 카페, 맛집, 전망대를 포함한 당일 데이트 코스입니다."
        );

        let orders: Vec<usize> = draft.stops.iter().map(|s| s.order_index).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(draft.stops[0].distance_from_previous_km, 0.0);
        assert!((draft.stops[1].distance_from_previous_km - 1.0).abs() < 1e-9);
        let minutes: Vec<u32> = draft.stops.iter().map(|s| s.visit_duration_minutes).collect();
        assert_eq!(minutes, vec![60, 90, 45]);
    }

    #[test]
    fn test_title_numbering_and_region_fallback() {
        let places = vec![
            LocationRecord::new("a", 35.1, 129.0, Category::Food).with_codes(Some(6), None),
            LocationRecord::new("b", 35.1001, 129.0, Category::Food).with_codes(Some(6), None),
            LocationRecord::new("c", 35.1002, 129.0, Category::Food).with_codes(Some(6), None),
        ];
        let clusters = group_into_clusters(places);
        let routes = build_routes(&clusters[0].members, &params(), &mut ClaimSet::new());

        let draft = assemble(&routes[0], &clusters[0], 3);
        assert_eq!(draft.course.title, "부산 데이트 코스 3");
        assert_eq!(draft.course.subregion_name, None);
        assert_eq!(
            draft.course.description,
            "부산의 맛집을 포함한 당일 데이트 코스입니다."
        );
    }

    #[rstest]
    #[case("카페", "를")]
    #[case("맛집", "을")]
    #[case("문화시설", "을")]
    #[case("명소", "를")]
    #[case("cafe", "를")]
    fn test_object_particle(#[case] word: &str, #[case] particle: &str) {
        assert_eq!(object_particle(word), particle);
    }
}
