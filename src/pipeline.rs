use crate::dedup::{dedupe, DEFAULT_LOOKBACK_DAYS};
use crate::fetcher::Fetcher;
use crate::normalize::normalize_feeds;
use crate::sources::validate_sources;
use crate::store::DraftStore;
use crate::types::{FetchConfig, IngestReport, Result, Source};
use chrono::Utc;
use tracing::{info, warn};

/// Sequences one ingest run: fetch -> load history -> normalize -> dedupe
/// -> persist -> summarize. Each phase completes fully (including per-source
/// timeouts and failures) before the next begins; persistence is the only
/// phase that touches the store for writing, so an aborted run leaves no
/// partial state.
pub struct IngestPipeline {
    sources: Vec<Source>,
    fetcher: Fetcher,
    store: DraftStore,
    lookback_days: i64,
}

impl IngestPipeline {
    pub fn new(
        sources: Vec<Source>,
        fetch_config: FetchConfig,
        store: DraftStore,
        lookback_days: Option<i64>,
    ) -> Result<Self> {
        validate_sources(&sources)?;
        Ok(Self {
            sources,
            fetcher: Fetcher::new(fetch_config)?,
            store,
            lookback_days: lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
        })
    }

    /// Run the pipeline once. In dry-run mode everything up to and
    /// including dedup happens normally but nothing is written.
    pub async fn run(&self, dry_run: bool) -> Result<IngestReport> {
        let now = Utc::now();
        let today = now.date_naive();
        let output_dir = self.store.partition_dir(today);

        info!(
            "Starting ingest: {} sources, date {}, mode {}",
            self.sources.len(),
            today,
            if dry_run { "dry-run" } else { "live" }
        );

        let mut errors = Vec::new();

        // Fetch phase: all sources concurrently, failures isolated.
        let feeds = self.fetcher.fetch_all(&self.sources).await;
        let total_fetched: usize = feeds.iter().map(|f| f.items.len()).sum();
        let failed_sources = feeds.iter().filter(|f| !f.success()).count();
        for feed in feeds.iter().filter(|f| !f.success()) {
            if let Some(error) = &feed.error {
                errors.push(format!("{}: {}", feed.source.name, error));
            }
        }
        info!(
            "Fetched {} items from {} feeds ({} failed)",
            total_fetched,
            feeds.len() - failed_sources,
            failed_sources
        );

        // History phase: recent drafts are the dedup reference set.
        let history = self.store.load_recent(self.lookback_days, today);
        info!(
            "Loaded {} recent drafts (last {} days)",
            history.len(),
            self.lookback_days
        );

        // Normalize + dedupe, both pure.
        let candidates = normalize_feeds(&feeds, now);
        let kept = dedupe(&candidates, &history, self.lookback_days, now);
        let total_deduplicated = total_fetched - kept.len();
        info!(
            "{} new drafts ({} duplicates or unusable items removed)",
            kept.len(),
            total_deduplicated
        );

        // Persist phase, skipped in dry-run.
        let total_written = if kept.is_empty() {
            info!("No new drafts to write");
            0
        } else if dry_run {
            info!("[dry-run] Would write {} drafts:", kept.len());
            for draft in kept.iter().take(5) {
                let preview: String = draft.title.chars().take(60).collect();
                info!("  - {}: {}", draft.category, preview);
            }
            if kept.len() > 5 {
                info!("  ... and {} more", kept.len() - 5);
            }
            0
        } else {
            let paths = self.store.write_drafts(&kept, today)?;
            info!("Wrote {} drafts to {}", paths.len(), output_dir.display());
            paths.len()
        };

        if failed_sources > 0 {
            warn!("{} source(s) failed this run, will retry next cycle", failed_sources);
        }

        Ok(IngestReport {
            total_fetched,
            total_deduplicated,
            total_written,
            failed_sources,
            errors,
            output_dir,
        })
    }
}
