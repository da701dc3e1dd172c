//! Region classification and clustering
//!
//! A place is keyed by its top-level region (resolved from `area_code`) and a
//! subregion: the numeric `sigungu_code` when present, otherwise a
//! district/city/county name parsed from the free-text address.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::LocationRecord;

/// Region name used for missing or unmapped area codes
pub const OTHER_REGION: &str = "기타";

const REGION_NAMES: [(i64, &str); 17] = [
    (1, "서울"),
    (2, "인천"),
    (3, "대전"),
    (4, "대구"),
    (5, "광주"),
    (6, "부산"),
    (7, "울산"),
    (8, "세종"),
    (31, "경기"),
    (32, "강원"),
    (33, "충북"),
    (34, "충남"),
    (35, "경북"),
    (36, "경남"),
    (37, "전북"),
    (38, "전남"),
    (39, "제주"),
];

/// Resolve an area code to its region name
#[must_use]
pub fn region_name(code: Option<i64>) -> &'static str {
    code.and_then(|code| {
        REGION_NAMES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, name)| *name)
    })
    .unwrap_or(OTHER_REGION)
}

/// Finer administrative unit within a region
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Subregion {
    Code(i64),
    Name(String),
}

impl fmt::Display for Subregion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subregion::Code(code) => write!(f, "#{code}"),
            Subregion::Name(name) => f.write_str(name),
        }
    }
}

/// Grouping key of a place. `subregion == None` means "ungrouped".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RegionKey {
    pub region_name: &'static str,
    pub subregion: Option<Subregion>,
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subregion {
            Some(subregion) => write!(f, "{}/{}", self.region_name, subregion),
            None => write!(f, "{}/-", self.region_name),
        }
    }
}

/// One address-suffix rule: applies when the address contains `marker` and
/// none of `excluded`; extracts the first match of `pattern`.
struct SuffixRule {
    marker: &'static str,
    excluded: Option<&'static str>,
    pattern: Regex,
}

impl SuffixRule {
    fn new(marker: &'static str, excluded: Option<&'static str>, pattern: &str) -> Self {
        Self {
            marker,
            excluded,
            pattern: Regex::new(pattern).expect("subregion pattern is valid"),
        }
    }

    fn applies(&self, address: &str) -> bool {
        address.contains(self.marker) && self.excluded.is_none_or(|ex| !address.contains(ex))
    }
}

/// Precedence order: district (구), city (시, but not 특별시), county (군).
/// Only the first applicable rule is tried.
static SUFFIX_RULES: LazyLock<[SuffixRule; 3]> = LazyLock::new(|| {
    [
        SuffixRule::new("구", None, r"[가-힣]+구"),
        SuffixRule::new("시", Some("특별시"), r"[가-힣]+시"),
        SuffixRule::new("군", None, r"[가-힣]+군"),
    ]
});

/// Parse a district/city/county name from a free-text address
#[must_use]
pub fn parse_subregion_name(address: Option<&str>) -> Option<String> {
    let address = address?;
    let rule = SUFFIX_RULES.iter().find(|rule| rule.applies(address))?;
    rule.pattern.find(address).map(|m| m.as_str().to_string())
}

/// Classify a place into its region key
#[must_use]
pub fn classify(record: &LocationRecord) -> RegionKey {
    let subregion = match record.subregion_code {
        Some(code) => Some(Subregion::Code(code)),
        None => parse_subregion_name(record.address.as_deref()).map(Subregion::Name),
    };

    RegionKey {
        region_name: region_name(record.region_code),
        subregion,
    }
}

/// The set of candidate places sharing one region key
#[derive(Debug, Clone)]
pub struct Cluster {
    pub key: RegionKey,
    /// Area code of the first member
    pub region_code: Option<i64>,
    /// Human-readable subregion name, if one could be found
    pub subregion_name: Option<String>,
    pub members: Vec<LocationRecord>,
}

impl Cluster {
    /// Name used in course titles: the subregion name, or the region name
    #[must_use]
    pub fn label(&self) -> &str {
        self.subregion_name.as_deref().unwrap_or(self.key.region_name)
    }

    #[must_use]
    pub fn subregion_code(&self) -> Option<i64> {
        match self.key.subregion {
            Some(Subregion::Code(code)) => Some(code),
            _ => None,
        }
    }

    fn resolve_subregion_name(&mut self) {
        self.subregion_name = match &self.key.subregion {
            Some(Subregion::Name(name)) => Some(name.clone()),
            Some(Subregion::Code(_)) => self
                .members
                .iter()
                .find_map(|member| parse_subregion_name(member.address.as_deref())),
            None => None,
        };
    }
}

/// Group places into clusters, keeping clusters and members in input order
#[must_use]
pub fn group_into_clusters(records: Vec<LocationRecord>) -> Vec<Cluster> {
    let mut index: HashMap<RegionKey, usize> = HashMap::new();
    let mut clusters: Vec<Cluster> = Vec::new();

    for record in records {
        let key = classify(&record);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            clusters.push(Cluster {
                key,
                region_code: record.region_code,
                subregion_name: None,
                members: Vec::new(),
            });
            clusters.len() - 1
        });
        clusters[slot].members.push(record);
    }

    for cluster in &mut clusters {
        cluster.resolve_subregion_name();
        debug!(
            "Cluster {} ({}) has {} places",
            cluster.key,
            cluster.label(),
            cluster.members.len()
        );
    }

    clusters
}
