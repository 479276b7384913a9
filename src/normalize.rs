use crate::types::{DraftItem, DraftSource, FetchedFeed, RawItem, RawRef, Source, SITE_LANGUAGE};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

const SLUG_MAX_LEN: usize = 80;
const ID_SLUG_MAX_LEN: usize = 40;
const ID_HASH_LEN: usize = 12;
const SUMMARY_MAX_LEN: usize = 200;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("valid regex"))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Decode HTML entities, strip markup tags, collapse whitespace, trim.
pub fn strip_html(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    let without_tags = tag_regex().replace_all(&decoded, "");
    whitespace_regex()
        .replace_all(&without_tags, " ")
        .trim()
        .to_string()
}

/// Lowercase, strip diacritics, keep only ASCII alphanumerics joined by
/// single hyphens, cap at 80 chars. Idempotent.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for ch in text.to_lowercase().nfd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(ch);
            pending_hyphen = false;
        } else {
            pending_hyphen = true;
        }
    }

    if slug.len() > SLUG_MAX_LEN {
        slug.truncate(SLUG_MAX_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

/// Normalized form of a title used for duplicate comparison: lowercase,
/// diacritics stripped, non-alphanumeric runs collapsed to single spaces.
/// Same normalization family as `slugify` but deliberately not the id.
pub fn normalize_title(title: &str) -> String {
    let mut normalized = String::with_capacity(title.len());
    let mut pending_space = false;

    for ch in title.to_lowercase().nfd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_ascii_alphanumeric() {
            if pending_space && !normalized.is_empty() {
                normalized.push(' ');
            }
            normalized.push(ch);
            pending_space = false;
        } else {
            pending_space = true;
        }
    }
    normalized
}

/// Deterministic content-addressed identifier for a draft.
///
/// SHA-256 of the article URL (title if the URL is empty), truncated to
/// 12 hex chars, prefixed with a short slug of the title for legibility:
/// `bts-announces-world-tour-3f9c2a81d04e`.
pub fn generate_id(item_url: &str, title: &str) -> String {
    let key = if item_url.is_empty() { title } else { item_url };
    let digest = Sha256::digest(key.as_bytes());
    let hash: String = digest
        .iter()
        .take(ID_HASH_LEN / 2)
        .map(|byte| format!("{:02x}", byte))
        .collect();

    let mut slug = slugify(title);
    if slug.len() > ID_SLUG_MAX_LEN {
        slug.truncate(ID_SLUG_MAX_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        hash
    } else {
        format!("{}-{}", slug, hash)
    }
}

/// Clean excerpt from the richer of the two body fields, truncated to the
/// display length with an ellipsis marker.
pub fn extract_summary(content: Option<&str>, description: Option<&str>) -> String {
    let text = strip_html(content.or(description).unwrap_or(""));
    if text.chars().count() <= SUMMARY_MAX_LEN {
        return text;
    }
    let truncated: String = text.chars().take(SUMMARY_MAX_LEN - 3).collect();
    format!("{}...", truncated)
}

/// Parse a publish timestamp in the formats feeds actually emit. Anything
/// unparseable falls back to the ingestion time so a draft never carries
/// a raw unparsed string.
pub fn coerce_timestamp(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return now;
    };

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    // Naive timestamps from sloppy feeds, assumed UTC.
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Utc.from_utc_datetime(&naive);
        }
    }
    now
}

/// Convert one raw feed entry into a draft. Entries missing a title or a
/// link cannot be addressed or deduplicated and are dropped.
pub fn draft_from_raw(item: &RawItem, source: &Source, now: DateTime<Utc>) -> Option<DraftItem> {
    let raw_title = item.title.as_deref()?;
    let item_url = item.link.as_deref()?.trim();
    if item_url.is_empty() {
        return None;
    }

    let title = strip_html(raw_title);
    if title.is_empty() {
        return None;
    }

    Some(DraftItem {
        id: generate_id(item_url, &title),
        source: DraftSource {
            name: source.name.clone(),
            url: source.url.clone(),
            item_url: item_url.to_string(),
        },
        category: source.category,
        title,
        summary: extract_summary(item.content.as_deref(), item.description.as_deref()),
        published_at: coerce_timestamp(item.published.as_deref(), now),
        language: SITE_LANGUAGE.to_string(),
        raw: RawRef {
            guid: item.guid.clone(),
            link: item.link.clone(),
        },
    })
}

/// Convert every entry of every fetched feed, accumulating across sources.
pub fn normalize_feeds(feeds: &[FetchedFeed], now: DateTime<Utc>) -> Vec<DraftItem> {
    let mut drafts = Vec::new();
    for feed in feeds {
        for item in &feed.items {
            if let Some(draft) = draft_from_raw(item, &feed.source, now) {
                drafts.push(draft);
            }
        }
    }
    drafts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    fn test_source() -> Source {
        Source {
            name: "Soompi K-Pop".to_string(),
            url: "https://www.soompi.com/feed/kpop".to_string(),
            category: Category::Kpop,
        }
    }

    #[test]
    fn strip_html_decodes_and_cleans() {
        let input = "<p>BTS &amp; BLACKPINK   top the &#8220;charts&#8221;</p>";
        assert_eq!(strip_html(input), "BTS & BLACKPINK top the \u{201C}charts\u{201D}");
    }

    #[test]
    fn slugify_is_idempotent() {
        for s in [
            "BTS Announces World Tour!!!",
            "Año nuevo en Seúl — guía",
            "   spaces   everywhere   ",
            "---already--slugged---",
            "한국 드라마 추천",
        ] {
            let once = slugify(s);
            assert_eq!(slugify(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn slugify_alphabet_and_bounds() {
        let long_title = "K-pop comeback! ".repeat(20);
        let slug = slugify(&long_title);
        assert!(slug.len() <= 80);
        assert!(!slug.starts_with('-') && !slug.ends_with('-'));
        assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert!(!slug.contains("--"));
    }

    #[test]
    fn slugify_strips_diacritics() {
        assert_eq!(slugify("Canción de Año Nuevo"), "cancion-de-ano-nuevo");
    }

    #[test]
    fn generate_id_is_deterministic_and_url_sensitive() {
        let a = generate_id("https://x.com/a", "BTS Announces World Tour");
        let b = generate_id("https://x.com/a", "BTS Announces World Tour");
        let c = generate_id("https://x.com/b", "BTS Announces World Tour");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("bts-announces-world-tour-"));
        assert_eq!(a.rsplit('-').next().unwrap().len(), 12);
    }

    #[test]
    fn generate_id_falls_back_to_title_without_url() {
        let id = generate_id("", "Solo title");
        assert!(id.starts_with("solo-title-"));
    }

    #[test]
    fn summary_prefers_content_and_truncates() {
        let summary = extract_summary(Some("<b>rich body</b>"), Some("plain description"));
        assert_eq!(summary, "rich body");

        let long = "palabra ".repeat(60);
        let truncated = extract_summary(None, Some(&long));
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 200);
    }

    #[test]
    fn coerce_timestamp_formats() {
        let now = Utc::now();
        let rfc2822 = coerce_timestamp(Some("Mon, 13 Jan 2025 09:00:00 +0900"), now);
        assert_eq!(rfc2822.to_rfc3339(), "2025-01-13T00:00:00+00:00");

        let rfc3339 = coerce_timestamp(Some("2025-01-13T09:00:00Z"), now);
        assert_eq!(rfc3339.to_rfc3339(), "2025-01-13T09:00:00+00:00");

        assert_eq!(coerce_timestamp(Some("not a date"), now), now);
        assert_eq!(coerce_timestamp(None, now), now);
    }

    #[test]
    fn drops_items_without_title_or_link() {
        let now = Utc::now();
        let source = test_source();
        assert!(draft_from_raw(&RawItem::default(), &source, now).is_none());
        assert!(draft_from_raw(
            &RawItem {
                title: Some("Only title".to_string()),
                ..Default::default()
            },
            &source,
            now
        )
        .is_none());
        assert!(draft_from_raw(
            &RawItem {
                link: Some("https://example.com/only-link".to_string()),
                ..Default::default()
            },
            &source,
            now
        )
        .is_none());
    }

    #[test]
    fn builds_complete_draft() {
        let now = Utc::now();
        let item = RawItem {
            title: Some("IU&#39;s New Album".to_string()),
            link: Some("https://example.com/iu-album".to_string()),
            guid: Some("iu-001".to_string()),
            published: Some("Mon, 13 Jan 2025 09:00:00 +0000".to_string()),
            description: Some("<p>Track list revealed.</p>".to_string()),
            content: None,
        };
        let draft = draft_from_raw(&item, &test_source(), now).unwrap();
        assert_eq!(draft.title, "IU's New Album");
        assert_eq!(draft.summary, "Track list revealed.");
        assert_eq!(draft.language, "es");
        assert_eq!(draft.category, Category::Kpop);
        assert_eq!(draft.source.item_url, "https://example.com/iu-album");
        assert_eq!(draft.raw.guid.as_deref(), Some("iu-001"));
        assert_eq!(draft.id, generate_id("https://example.com/iu-album", "IU's New Album"));
    }
}
