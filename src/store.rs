use crate::types::{DraftItem, Result};
use chrono::{Duration, NaiveDate};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const DEFAULT_DATA_DIR: &str = "data/drafts";

fn partition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"))
}

/// Aggregate counts across all partitions, for operational visibility.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_drafts: usize,
    pub by_date: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

/// Date-partitioned draft store: one `YYYY-MM-DD/` directory per ingestion
/// date, one `{id}.json` file per draft.
///
/// Append-only per run, single-writer by design: nothing here locks, the
/// scheduler is expected to run at most one ingest at a time.
pub struct DraftStore {
    root: PathBuf,
}

impl DraftStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn partition_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format("%Y-%m-%d").to_string())
    }

    /// Write one file per draft into the date partition, returning the
    /// written paths. An empty batch is a no-op: no directory is created.
    pub fn write_drafts(&self, drafts: &[DraftItem], date: NaiveDate) -> Result<Vec<PathBuf>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let dir = self.partition_dir(date);
        std::fs::create_dir_all(&dir)?;

        let mut paths = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let path = dir.join(format!("{}.json", draft.id));
            let json = serde_json::to_string_pretty(draft)?;
            std::fs::write(&path, json)?;
            paths.push(path);
        }

        debug!("Wrote {} drafts to {}", paths.len(), dir.display());
        Ok(paths)
    }

    /// Load every readable draft from one date partition. A missing
    /// partition means zero items; a corrupt record is skipped with a
    /// warning rather than aborting the read.
    pub fn load_partition(&self, date: NaiveDate) -> Vec<DraftItem> {
        self.load_partition_dir(&self.partition_dir(date))
    }

    /// Load drafts from the trailing `lookback_days` partitions, today
    /// included.
    pub fn load_recent(&self, lookback_days: i64, today: NaiveDate) -> Vec<DraftItem> {
        let mut items = Vec::new();
        for offset in 0..lookback_days {
            let date = today - Duration::days(offset);
            items.extend(self.load_partition(date));
        }
        items
    }

    /// Scan all partitions and aggregate counts by date and category.
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        if !self.root.exists() {
            return Ok(stats);
        }

        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !entry.path().is_dir() || !partition_regex().is_match(&name) {
                continue;
            }

            let items = self.load_partition_dir(&entry.path());
            stats.total_drafts += items.len();
            stats.by_date.insert(name, items.len());
            for item in items {
                *stats
                    .by_category
                    .entry(item.category.to_string())
                    .or_insert(0) += 1;
            }
        }

        Ok(stats)
    }

    fn load_partition_dir(&self, dir: &Path) -> Vec<DraftItem> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut items = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<DraftItem>(&content) {
                    Ok(item) => items.push(item),
                    Err(e) => warn!("Skipping corrupt draft {}: {}", path.display(), e),
                },
                Err(e) => warn!("Skipping unreadable draft {}: {}", path.display(), e),
            }
        }
        items
    }
}
