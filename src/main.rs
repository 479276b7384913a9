use anyhow::Context;
use clap::Parser;
use onda_ingest::{
    sources, DraftStore, FetchConfig, IngestPipeline, IngestReport, DEFAULT_DATA_DIR,
    DEFAULT_LOOKBACK_DAYS,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Fetch the registered RSS feeds, normalize and deduplicate their items,
/// and write surviving drafts into the date-partitioned store.
#[derive(Parser, Debug)]
#[command(name = "onda-ingest", version, about)]
struct Args {
    /// Fetch, normalize and dedupe, but skip all writes
    #[arg(long)]
    dry_run: bool,

    /// Report aggregate draft-store counts without fetching
    #[arg(long)]
    stats: bool,

    /// Root directory of the draft store
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// JSON file replacing the built-in source registry
    #[arg(long)]
    sources: Option<PathBuf>,

    /// Dedup lookback window in days
    #[arg(long, default_value_t = DEFAULT_LOOKBACK_DAYS)]
    lookback_days: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let store = DraftStore::new(&args.data_dir);

    if args.stats {
        return show_stats(&store);
    }

    let registry = match &args.sources {
        Some(path) => sources::load_sources(path)
            .with_context(|| format!("failed to load sources from {}", path.display()))?,
        None => sources::default_sources(),
    };

    let pipeline = IngestPipeline::new(
        registry,
        FetchConfig::default(),
        store,
        Some(args.lookback_days),
    )
    .context("failed to build ingest pipeline")?;

    let report = match pipeline.run(args.dry_run).await {
        Ok(report) => report,
        Err(e) => {
            error!("Fatal ingest error: {}", e);
            return Err(e.into());
        }
    };

    print_summary(&report, args.dry_run);

    if report.total_failure() {
        anyhow::bail!("ingest failed completely: every source failed and nothing was fetched");
    }
    Ok(())
}

fn print_summary(report: &IngestReport, dry_run: bool) {
    println!("\nIngest summary");
    println!("  Fetched:      {}", report.total_fetched);
    println!("  Deduplicated: {}", report.total_deduplicated);
    if dry_run {
        println!("  Written:      0 (dry run)");
    } else {
        println!("  Written:      {}", report.total_written);
    }
    println!("  Output:       {}", report.output_dir.display());
    if !report.errors.is_empty() {
        println!("  Errors:       {}", report.errors.len());
        for error in &report.errors {
            println!("    - {}", error);
        }
    }
}

fn show_stats(store: &DraftStore) -> anyhow::Result<()> {
    let stats = store.stats().context("failed to read draft store")?;

    println!("Draft statistics\n");
    println!("Total drafts: {}", stats.total_drafts);

    println!("\nBy date:");
    for (date, count) in stats.by_date.iter().rev().take(10) {
        println!("  {}: {}", date, count);
    }

    println!("\nBy category:");
    for (category, count) in &stats.by_category {
        println!("  {}: {}", category, count);
    }
    Ok(())
}
