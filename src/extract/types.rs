//! Type definitions for the extraction module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::time::Duration;

/// Where an extraction record's payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Api,
    RenderedPage,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Api => write!(f, "api"),
            Source::RenderedPage => write!(f, "rendered_page"),
        }
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "api" => Ok(Source::Api),
            "rendered" | "rendered_page" | "browser" => Ok(Source::RenderedPage),
            other => Err(format!("unknown detail source '{}'", other)),
        }
    }
}

/// The labelled tables of one catalog record, already split by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub certifiers: Vec<String>,
    #[serde(default)]
    pub courses: Vec<String>,
    #[serde(default)]
    pub occupations: Vec<String>,
    #[serde(default)]
    pub committee_members: Vec<String>,
}

impl RawPayload {
    /// A payload with neither a title nor a certifier carries no information.
    pub fn is_uninformative(&self) -> bool {
        self.title.trim().is_empty() && self.certifiers.is_empty()
    }
}

/// One successful extraction. A re-run for the same work item replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    #[serde(rename = "ec_code")]
    pub work_item: String,
    #[serde(flatten)]
    pub payload: RawPayload,
    #[serde(rename = "extraction_time")]
    pub extracted_at: DateTime<Utc>,
    pub source: Source,
}

/// A table scraped from a detail view: its header text and first-column rows.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LabeledTable {
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub rows: Vec<String>,
}

/// Unclassified detail view as returned by a detail source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawDetail {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tables: Vec<LabeledTable>,
}

/// Table categories recognised by header keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Certifiers,
    Courses,
    Occupations,
    CommitteeMembers,
}

/// Header keywords in match priority order.
pub const HEADER_KEYWORDS: &[(&str, TableKind)] = &[
    ("certificador", TableKind::Certifiers),
    ("curso", TableKind::Courses),
    ("ocupacion", TableKind::Occupations),
    ("integrantes", TableKind::CommitteeMembers),
];

// Constants
pub const DEFAULT_MAX_RETRIES: usize = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const SETTLE_DELAY: Duration = Duration::from_secs(3);
