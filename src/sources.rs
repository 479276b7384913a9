use crate::types::{Category, IngestError, Result, Source};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;
use url::Url;

/// Built-in feed registry. Matches the feeds the site launched with;
/// a JSON file passed via `--sources` replaces the whole list.
pub fn default_sources() -> Vec<Source> {
    let sources = [
        ("Soompi K-Pop", "https://www.soompi.com/feed/kpop", Category::Kpop),
        ("AllKPop", "https://www.allkpop.com/rss", Category::Kpop),
        ("KoreaBoo", "https://www.koreaboo.com/feed/", Category::Kpop),
        (
            "Korea Herald Lifestyle",
            "https://www.koreaherald.com/common/rss_xml.php?ct=108",
            Category::KoreaLife,
        ),
        (
            "Korea JoongAng Daily Life",
            "https://koreajoongangdaily.joins.com/section/rss/life-style",
            Category::KoreaLife,
        ),
        (
            "Korea Herald National",
            "https://www.koreaherald.com/common/rss_xml.php?ct=102",
            Category::KoreaInfo,
        ),
        ("Yonhap News English", "https://en.yna.co.kr/RSS/news.xml", Category::KoreaInfo),
    ];

    sources
        .into_iter()
        .map(|(name, url, category)| Source {
            name: name.to_string(),
            url: url.to_string(),
            category,
        })
        .collect()
}

/// Load a source registry from a JSON file, replacing the built-in list.
///
/// Validation happens here so misconfiguration fails the run at startup
/// instead of surfacing as mysterious per-source fetch errors later.
pub fn load_sources(path: &Path) -> Result<Vec<Source>> {
    let content = std::fs::read_to_string(path)?;
    let sources: Vec<Source> = serde_json::from_str(&content)?;
    validate_sources(&sources)?;
    info!("Loaded {} sources from {}", sources.len(), path.display());
    Ok(sources)
}

/// Structural checks on a registry: non-empty, unique names, http(s) URLs.
pub fn validate_sources(sources: &[Source]) -> Result<()> {
    if sources.is_empty() {
        return Err(IngestError::Config("source registry is empty".to_string()));
    }

    let mut names = HashSet::new();
    for source in sources {
        if source.name.trim().is_empty() {
            return Err(IngestError::Config("source with empty name".to_string()));
        }
        if !names.insert(source.name.as_str()) {
            return Err(IngestError::Config(format!(
                "duplicate source name: {}",
                source.name
            )));
        }
        let url = Url::parse(&source.url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(IngestError::Config(format!(
                "source {} has non-http(s) URL: {}",
                source.name, source.url
            )));
        }
    }

    Ok(())
}

/// Filter the registry down to one category.
pub fn sources_by_category(sources: &[Source], category: Category) -> Vec<Source> {
    sources
        .iter()
        .filter(|s| s.category == category)
        .cloned()
        .collect()
}
