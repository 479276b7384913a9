use crate::normalize::normalize_title;
use crate::types::DraftItem;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::debug;

pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;

/// Filter a candidate batch against recent history and against itself.
///
/// Pure membership filter, first-seen-wins, no scoring. A candidate is
/// dropped when its article URL or its exact normalized title was already
/// seen, either in history items published within the lookback window or
/// earlier in the same batch. Everything is deterministic for a fixed
/// candidate order, history, and `now`.
pub fn dedupe(
    candidates: &[DraftItem],
    history: &[DraftItem],
    lookback_days: i64,
    now: DateTime<Utc>,
) -> Vec<DraftItem> {
    let cutoff = now - Duration::days(lookback_days);

    // Both lookup sets are windowed: items older than the lookback are
    // irrelevant for matching and would otherwise grow without bound.
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut seen_titles: HashSet<String> = HashSet::new();
    for item in history {
        if item.published_at >= cutoff {
            seen_urls.insert(item.source.item_url.clone());
            seen_titles.insert(normalize_title(&item.title));
        }
    }

    let mut kept = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let url = &candidate.source.item_url;
        let title = normalize_title(&candidate.title);

        if seen_urls.contains(url) || seen_titles.contains(&title) {
            debug!("Dropping duplicate: {} ({})", candidate.title, url);
            continue;
        }

        seen_urls.insert(url.clone());
        seen_titles.insert(title);
        kept.push(candidate.clone());
    }

    let removed = candidates.len() - kept.len();
    if removed > 0 {
        debug!("Removed {} duplicate candidates", removed);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::generate_id;
    use crate::types::{Category, DraftSource, RawRef};

    fn draft(url: &str, title: &str, published_at: DateTime<Utc>) -> DraftItem {
        DraftItem {
            id: generate_id(url, title),
            source: DraftSource {
                name: "Test Feed".to_string(),
                url: "https://feed.example.com/rss".to_string(),
                item_url: url.to_string(),
            },
            category: Category::Kpop,
            title: title.to_string(),
            summary: String::new(),
            published_at,
            language: "es".to_string(),
            raw: RawRef::default(),
        }
    }

    #[test]
    fn url_match_wins_regardless_of_title() {
        let now = Utc::now();
        let history = vec![draft("https://x.com/a", "BTS Tour Announced", now)];
        let candidates = vec![draft("https://x.com/a", "BTS Announces World Tour", now)];
        assert!(dedupe(&candidates, &history, 7, now).is_empty());
    }

    #[test]
    fn normalized_title_match_across_urls() {
        let now = Utc::now();
        let history = vec![draft("https://z.com/c", "BTS Announces World Tour", now)];
        let candidates = vec![draft("https://y.com/b", "BTS announces WORLD tour!!!", now)];
        assert!(dedupe(&candidates, &history, 7, now).is_empty());
    }

    #[test]
    fn history_outside_window_is_ignored() {
        let now = Utc::now();
        let history = vec![draft(
            "https://old.com/a",
            "Identical Title",
            now - Duration::days(10),
        )];
        let candidates = vec![draft("https://new.com/b", "Identical Title", now)];
        let kept = dedupe(&candidates, &history, 7, now);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn within_batch_url_dedup_keeps_first() {
        let now = Utc::now();
        let candidates = vec![
            draft("https://x.com/same", "First Title", now),
            draft("https://x.com/same", "Second Title", now),
        ];
        let kept = dedupe(&candidates, &[], 7, now);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "First Title");
    }

    #[test]
    fn within_batch_title_dedup() {
        let now = Utc::now();
        let candidates = vec![
            draft("https://a.com/1", "Comeback: Stage Revealed", now),
            draft("https://b.com/2", "comeback stage   REVEALED", now),
        ];
        let kept = dedupe(&candidates, &[], 7, now);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source.item_url, "https://a.com/1");
    }

    #[test]
    fn idempotent_over_history() {
        let now = Utc::now();
        let history = vec![draft("https://h.com/1", "Old Story", now)];
        let candidates = vec![
            draft("https://c.com/1", "New Story One", now),
            draft("https://c.com/2", "New Story Two", now),
            draft("https://h.com/1", "Old Story Rerun", now),
        ];
        let kept = dedupe(&candidates, &history, 7, now);
        assert_eq!(kept.len(), 2);

        let mut extended = history.clone();
        extended.extend(kept.clone());
        let second_pass = dedupe(&kept, &extended, 7, now);
        assert!(second_pass.is_empty());
    }

    #[test]
    fn distinct_stories_survive() {
        let now = Utc::now();
        let candidates = vec![
            draft("https://a.com/1", "NewJeans tops charts", now),
            draft("https://a.com/2", "Seoul subway fares rise", now),
        ];
        let kept = dedupe(&candidates, &[], 7, now);
        assert_eq!(kept.len(), 2);
    }
}
