//! Configuration management for the course generator
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::CourseError;
use crate::filter::FilterPolicy;
use crate::generator::{FailurePolicy, GenerationSettings};
use crate::route::{RouteMode, RouteParams};
use anyhow::{Context, Result};
use clap::ValueEnum;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseConfig {
    /// Store connection settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Course generation settings
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Supabase store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Project URL, e.g. `https://<project>.supabase.co`
    pub url: Option<String>,
    /// Service role key used for both reads and writes
    pub service_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for failed reads
    #[serde(default = "default_store_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_places_table")]
    pub places_table: String,
    #[serde(default = "default_courses_table")]
    pub courses_table: String,
    #[serde(default = "default_stops_table")]
    pub stops_table: String,
}

/// Named bundle of generation defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Date-tagged places, one long course per region
    Broad,
    /// Typed places with codes, several short courses per district
    #[default]
    Sigungu,
}

impl Profile {
    /// Settings of this profile before any explicit override
    #[must_use]
    pub fn defaults(self) -> GenerationSettings {
        match self {
            Profile::Broad => GenerationSettings {
                filter_policy: FilterPolicy::DateTaggedBroad,
                route: RouteParams {
                    max_hop_km: 5.0,
                    min_stops: 3,
                    max_stops: 10,
                    mode: RouteMode::Single,
                    seed_scan_limit: 20,
                },
                fetch_limit: Some(10_000),
                failure_policy: FailurePolicy::Release,
                concurrency: default_concurrency(),
            },
            Profile::Sigungu => GenerationSettings {
                filter_policy: FilterPolicy::TypedAndGeotagged,
                route: RouteParams {
                    max_hop_km: 3.0,
                    min_stops: 3,
                    max_stops: 4,
                    mode: RouteMode::Multi,
                    seed_scan_limit: 20,
                },
                fetch_limit: None,
                failure_policy: FailurePolicy::Release,
                concurrency: default_concurrency(),
            },
        }
    }
}

/// Course generation settings. Unset values come from the profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub profile: Profile,
    pub max_hop_km: Option<f64>,
    pub min_stops_per_course: Option<usize>,
    pub max_stops_per_course: Option<usize>,
    pub filter_policy: Option<FilterPolicy>,
    pub route_mode: Option<RouteMode>,
    pub seed_scan_limit: Option<usize>,
    pub fetch_limit: Option<usize>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Clusters persisted concurrently
    pub concurrency: Option<usize>,
}

impl GenerationConfig {
    /// Resolve the profile and explicit overrides into run settings
    #[must_use]
    pub fn settings(&self) -> GenerationSettings {
        let mut settings = self.profile.defaults();

        if let Some(max_hop_km) = self.max_hop_km {
            settings.route.max_hop_km = max_hop_km;
        }
        if let Some(min_stops) = self.min_stops_per_course {
            settings.route.min_stops = min_stops;
        }
        if let Some(max_stops) = self.max_stops_per_course {
            settings.route.max_stops = max_stops;
        }
        if let Some(policy) = self.filter_policy {
            settings.filter_policy = policy;
        }
        if let Some(mode) = self.route_mode {
            settings.route.mode = mode;
        }
        if let Some(limit) = self.seed_scan_limit {
            settings.route.seed_scan_limit = limit;
        }
        if self.fetch_limit.is_some() {
            settings.fetch_limit = self.fetch_limit;
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency;
        }
        settings.failure_policy = self.failure_policy;

        settings
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_store_timeout() -> u32 {
    30
}

fn default_store_max_retries() -> u32 {
    3
}

fn default_places_table() -> String {
    "places".to_string()
}

fn default_courses_table() -> String {
    "date_courses".to_string()
}

fn default_stops_table() -> String {
    "date_course_places".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_key: None,
            timeout_seconds: default_store_timeout(),
            max_retries: default_store_max_retries(),
            places_table: default_places_table(),
            courses_table: default_courses_table(),
            stops_table: default_stops_table(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl CourseConfig {
    /// Load configuration from `config_path`, or the default location when
    /// `None`, layered under `DATECOURSE_*` environment variables
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // DATECOURSE_GENERATION__MAX_HOP_KM=2.5 and friends
        builder = builder.add_source(
            Environment::with_prefix("DATECOURSE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: CourseConfig = settings
            .try_deserialize()
            .with_context(|| {
                format!(
                    "Failed to deserialize configuration from {}",
                    config_file.display()
                )
            })?;

        config.apply_env_credentials(|name| std::env::var(name).ok());
        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("datecourse").join("config.toml"))
    }

    /// Fill missing store credentials from the conventional Supabase
    /// variables
    pub fn apply_env_credentials<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if self.store.url.is_none() {
            self.store.url =
                present("NEXT_PUBLIC_SUPABASE_URL").or_else(|| present("SUPABASE_URL"));
        }
        if self.store.service_key.is_none() {
            self.store.service_key = present("SUPABASE_SERVICE_ROLE_KEY");
        }
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.store.timeout_seconds == 0 {
            self.store.timeout_seconds = default_store_timeout();
        }
        if self.store.places_table.is_empty() {
            self.store.places_table = default_places_table();
        }
        if self.store.courses_table.is_empty() {
            self.store.courses_table = default_courses_table();
        }
        if self.store.stops_table.is_empty() {
            self.store.stops_table = default_stops_table();
        }
        if self.generation.concurrency == Some(0) {
            self.generation.concurrency = None;
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Check that the remote store can be reached with these settings.
    /// Only needed when the run reads from or writes to Supabase.
    pub fn validate_store_credentials(&self) -> Result<()> {
        match self.store.url.as_deref() {
            None | Some("") => {
                return Err(CourseError::config(
                    "Store URL is not set. Set SUPABASE_URL or NEXT_PUBLIC_SUPABASE_URL, or store.url in the config file",
                )
                .into());
            }
            Some(_) => {}
        }

        match self.store.service_key.as_deref() {
            None | Some("") => Err(CourseError::config(
                "Store service key is not set. Set SUPABASE_SERVICE_ROLE_KEY or store.service_key in the config file",
            )
            .into()),
            Some(_) => Ok(()),
        }
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        let settings = self.generation.settings();
        let route = &settings.route;

        if !(route.max_hop_km > 0.0 && route.max_hop_km <= 50.0) {
            return Err(CourseError::config(format!(
                "max_hop_km must be within (0, 50], got {}",
                route.max_hop_km
            ))
            .into());
        }

        if route.min_stops < 2 {
            return Err(CourseError::config("min_stops_per_course must be at least 2").into());
        }

        if route.max_stops < route.min_stops {
            return Err(CourseError::config(format!(
                "max_stops_per_course ({}) cannot be below min_stops_per_course ({})",
                route.max_stops, route.min_stops
            ))
            .into());
        }

        if route.max_stops > 30 {
            return Err(CourseError::config("max_stops_per_course cannot exceed 30").into());
        }

        if route.seed_scan_limit == 0 {
            return Err(CourseError::config("seed_scan_limit must be at least 1").into());
        }

        if settings.fetch_limit == Some(0) {
            return Err(CourseError::config("fetch_limit must be at least 1").into());
        }

        if self.store.timeout_seconds > 300 {
            return Err(CourseError::config("Store timeout cannot exceed 300 seconds").into());
        }

        if self.store.max_retries > 10 {
            return Err(CourseError::config("Store max retries cannot exceed 10").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(CourseError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(CourseError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        if let Some(url) = &self.store.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(
                    CourseError::config("Store URL must be a valid HTTP or HTTPS URL").into(),
                );
            }
        }

        Ok(())
    }
}
