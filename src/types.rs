use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Content language of the site the drafts are ingested for.
pub const SITE_LANGUAGE: &str = "es";

/// Closed set of editorial categories. Unknown category strings are
/// rejected when the source registry is loaded, not propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Kpop,
    KoreaLife,
    KoreaInfo,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Kpop => "kpop",
            Category::KoreaLife => "korea_life",
            Category::KoreaInfo => "korea_info",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One external feed configuration. Loaded at startup, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub category: Category,
}

/// A single feed entry as extracted from the wire. Untrusted input:
/// every field may be absent or contain markup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    pub published: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
}

/// Result of fetching one source. A failed fetch still produces one of
/// these, with zero items and the error recorded, so that one bad feed
/// never aborts the batch.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub source: Source,
    pub items: Vec<RawItem>,
    pub error: Option<String>,
}

impl FetchedFeed {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Provenance of a draft: the feed it came from and the article URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSource {
    pub name: String,
    pub url: String,
    pub item_url: String,
}

/// Original wire identifiers kept for traceability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// The canonical ingested-content record, one JSON file per draft.
///
/// `id` is content-addressed: a pure function of the article URL and
/// title, so re-ingesting the same entry always yields the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftItem {
    pub id: String,
    pub source: DraftSource,
    pub category: Category,
    pub title: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
    pub language: String,
    pub raw: RawRef,
}

/// HTTP fetch configuration shared by all sources in a run.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "OndaCoreana-RSS-Ingest/1.0".to_string(),
            timeout_seconds: 10,
            max_retries: 2,
            retry_delay_seconds: 1,
            max_feed_size_mb: 10,
        }
    }
}

/// Aggregate counts for one ingest run, reported at the end.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub total_fetched: usize,
    pub total_deduplicated: usize,
    pub total_written: usize,
    pub failed_sources: usize,
    pub errors: Vec<String>,
    pub output_dir: PathBuf,
}

impl IngestReport {
    /// True when every source failed and nothing at all was ingested.
    /// Feeds legitimately returning zero new items is not a failure.
    pub fn total_failure(&self) -> bool {
        self.failed_sources > 0 && self.total_fetched == 0 && self.total_written == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Feed size exceeds limit: {size_mb}MB")]
    FeedTooLarge { size_mb: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
