//! Supabase (PostgREST) store backend
//!
//! Reads are idempotent and go through a retrying client. Course and stop
//! inserts are sent exactly once; a failed write is reported to the caller.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::RetryTransientMiddleware;
use reqwest_retry::policies::ExponentialBackoff;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::{CourseStore, PlaceQuery};
use crate::config::StoreConfig;
use crate::models::{Course, CourseId, CourseStop, CourseStopRow, LocationRecord};
use crate::{CourseError, Result};

const USER_AGENT: &str = concat!("datecourse/", env!("CARGO_PKG_VERSION"));

const PLACE_COLUMNS: &str =
    "id,name,lat,lng,type,rating,address,area_code,sigungu_code,course_type,image_url";

/// Matches every row; PostgREST refuses unfiltered deletes
const ALL_ROWS: &str = "id=not.is.null";

#[derive(Debug, Deserialize)]
struct InsertedRow {
    id: CourseId,
}

/// Store talking to the Supabase REST endpoint
pub struct SupabaseStore {
    base_url: String,
    reader: ClientWithMiddleware,
    writer: Client,
    places_table: String,
    courses_table: String,
    stops_table: String,
}

impl SupabaseStore {
    /// Build a store from validated configuration
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| CourseError::config("store url is not set"))?;
        let key = config
            .service_key
            .as_deref()
            .ok_or_else(|| CourseError::config("store service key is not set"))?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {key}"))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let writer = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| CourseError::config(format!("Failed to create HTTP client: {e}")))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let reader = ClientBuilder::new(writer.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            reader,
            writer,
            places_table: config.places_table.clone(),
            courses_table: config.courses_table.clone(),
            stops_table: config.stops_table.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, urlencoding::encode(table))
    }

    fn places_url(&self, query: &PlaceQuery) -> String {
        let mut params = vec![
            format!("select={PLACE_COLUMNS}"),
            "lat=not.is.null".to_string(),
            "lng=not.is.null".to_string(),
        ];

        if query.require_region_codes {
            params.push("area_code=not.is.null".to_string());
            params.push("sigungu_code=not.is.null".to_string());
        }

        if let Some(categories) = &query.categories {
            let tags: Vec<String> = categories
                .iter()
                .map(|c| urlencoding::encode(c.as_str()).into_owned())
                .collect();
            params.push(format!("type=in.({})", tags.join(",")));
        }

        params.push("order=area_code.asc,sigungu_code.asc,rating.desc.nullslast".to_string());

        if let Some(limit) = query.limit {
            params.push(format!("limit={limit}"));
        }

        format!("{}?{}", self.table_url(&self.places_table), params.join("&"))
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| CourseError::config("store service key contains invalid characters"))
}

/// Turn a non-success response into a store error carrying status and body
async fn check_status(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!("{} failed with HTTP {}: {}", action, status, body);
    Err(CourseError::store(format!(
        "{action} failed with HTTP {status}: {body}"
    )))
}

#[async_trait]
impl CourseStore for SupabaseStore {
    #[instrument(skip(self))]
    async fn fetch_places(&self, query: &PlaceQuery) -> Result<Vec<LocationRecord>> {
        let url = self.places_url(query);
        debug!("Place query URL: {}", url);

        let start = Instant::now();
        let response = self.reader.get(&url).send().await?;
        let response = check_status(response, "Place fetch").await?;
        let places: Vec<LocationRecord> = response.json().await?;

        info!(
            "Fetched {} places in {:.3}s",
            places.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(places)
    }

    #[instrument(skip(self))]
    async fn clear_courses(&self) -> Result<()> {
        // stops reference courses, so they go first
        for table in [&self.stops_table, &self.courses_table] {
            let url = format!("{}?{ALL_ROWS}", self.table_url(table));
            let response = self.writer.delete(&url).send().await?;
            check_status(response, &format!("Clearing {table}")).await?;
            debug!("Cleared table {}", table);
        }
        Ok(())
    }

    async fn insert_course(&self, course: &Course) -> Result<CourseId> {
        let response = self
            .writer
            .post(self.table_url(&self.courses_table))
            .header("Prefer", "return=representation")
            .json(course)
            .send()
            .await?;
        let response = check_status(response, "Course insert").await?;

        let rows: Vec<InsertedRow> = response.json().await?;
        rows.into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| CourseError::store("Course insert returned no row"))
    }

    async fn insert_stops(&self, course_id: &CourseId, stops: &[CourseStop]) -> Result<()> {
        let rows: Vec<CourseStopRow<'_>> = stops
            .iter()
            .map(|stop| CourseStopRow { course_id, stop })
            .collect();

        let response = self
            .writer
            .post(self.table_url(&self.stops_table))
            .json(&rows)
            .send()
            .await?;
        check_status(response, "Stop insert").await?;
        Ok(())
    }

    async fn delete_course(&self, course_id: &CourseId) -> Result<()> {
        let url = format!(
            "{}?id=eq.{}",
            self.table_url(&self.courses_table),
            urlencoding::encode(course_id.as_str())
        );
        let response = self.writer.delete(&url).send().await?;
        check_status(response, "Course delete").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterPolicy;

    fn store_config() -> StoreConfig {
        StoreConfig {
            url: Some("https://demo.supabase.co/".to_string()),
            service_key: Some("service-key".to_string()),
            ..StoreConfig::default()
        }
    }

    #[test]
    fn test_places_url_for_typed_policy() {
        let store = SupabaseStore::new(&store_config()).unwrap();
        let url = store.places_url(&PlaceQuery::for_policy(FilterPolicy::TypedAndGeotagged, None));

        assert!(url.starts_with("https://demo.supabase.co/rest/v1/places?select="));
        assert!(url.contains("lat=not.is.null&lng=not.is.null"));
        assert!(url.contains("area_code=not.is.null&sigungu_code=not.is.null"));
        assert!(url.contains("type=in.(CAFE,FOOD,VIEW)"));
        assert!(url.contains("order=area_code.asc,sigungu_code.asc,rating.desc.nullslast"));
        assert!(!url.contains("limit="));
    }

    #[test]
    fn test_places_url_for_broad_policy() {
        let store = SupabaseStore::new(&store_config()).unwrap();
        let url = store.places_url(&PlaceQuery::for_policy(
            FilterPolicy::DateTaggedBroad,
            Some(10_000),
        ));

        assert!(!url.contains("type=in."));
        assert!(!url.contains("area_code=not.is.null"));
        assert!(url.ends_with("limit=10000"));
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let config = StoreConfig {
            service_key: None,
            ..store_config()
        };
        assert!(matches!(
            SupabaseStore::new(&config),
            Err(CourseError::Config { .. })
        ));
    }

    #[test]
    fn test_invalid_key_is_config_error() {
        let config = StoreConfig {
            service_key: Some("bad\nkey".to_string()),
            ..store_config()
        };
        assert!(matches!(
            SupabaseStore::new(&config),
            Err(CourseError::Config { .. })
        ));
    }
}
