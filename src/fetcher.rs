use crate::parser;
use crate::types::{FetchConfig, FetchedFeed, IngestError, Result, Source};
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

const FEED_ACCEPT: &str = "application/rss+xml, application/xml, text/xml, */*";

/// HTTP fetcher for feed endpoints.
///
/// Every failure mode (timeout, connection error, non-2xx, oversized body,
/// HTML error page where a feed should be) is contained per source: the
/// returned `FetchedFeed` carries zero items and the error string instead
/// of propagating, so the batch always completes.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    /// Fetch and parse one source. Never returns an error.
    pub async fn fetch_feed(&self, source: &Source) -> FetchedFeed {
        debug!("Fetching feed: {} ({})", source.name, source.url);

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 8),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 30)),
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.fetch_body(&source.url).await {
                Ok(body) => {
                    if !parser::looks_like_feed(&body) {
                        // Retrying an HTML error page rarely helps.
                        return self.failed(source, "response is not an RSS/Atom document");
                    }
                    let items = parser::parse_items(&body);
                    debug!("Fetched {} items from {}", items.len(), source.name);
                    return FetchedFeed {
                        source: source.clone(),
                        items,
                        error: None,
                    };
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            warn!(
                                "Attempt {} failed for {}, retrying in {:?}",
                                attempt + 1,
                                source.name,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown fetch error".to_string());
        self.failed(source, &message)
    }

    /// Fetch all sources concurrently. One `FetchedFeed` per source
    /// regardless of outcome; failed sources come back with zero items.
    pub async fn fetch_all(&self, sources: &[Source]) -> Vec<FetchedFeed> {
        info!("Fetching {} feeds", sources.len());

        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                let fetcher = self.clone();
                let source = source.clone();
                tokio::spawn(async move { fetcher.fetch_feed(&source).await })
            })
            .collect();

        let mut results = Vec::with_capacity(sources.len());
        for (handle, source) in handles.into_iter().zip(sources) {
            match handle.await {
                Ok(feed) => results.push(feed),
                Err(e) => results.push(self.failed(source, &format!("fetch task failed: {}", e))),
            }
        }

        let failed = results.iter().filter(|f| !f.success()).count();
        if failed > 0 {
            warn!("{} of {} feeds failed to fetch", failed, sources.len());
        }
        results
    }

    async fn fetch_body(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header("Accept", FEED_ACCEPT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Fetch(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        if let Some(content_length) = response.content_length() {
            let size_mb = content_length as usize / (1024 * 1024);
            if size_mb > self.config.max_feed_size_mb {
                return Err(IngestError::FeedTooLarge { size_mb });
            }
        }

        Ok(response.text().await?)
    }

    fn failed(&self, source: &Source, message: &str) -> FetchedFeed {
        warn!("Failed to fetch {}: {}", source.name, message);
        FetchedFeed {
            source: source.clone(),
            items: Vec::new(),
            error: Some(message.to_string()),
        }
    }
}
