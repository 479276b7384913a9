use crate::types::RawItem;
use feed_rs::parser;
use regex::Regex;
use tracing::{debug, warn};

/// Parse a feed document into raw items.
///
/// feed-rs handles well-formed RSS and Atom. Documents it rejects outright
/// (truncated XML, unescaped ampersands, broken declarations) go through a
/// regex fallback that scrapes `<item>`/`<entry>` blocks, so one malformed
/// feed still yields whatever entries are salvageable.
pub fn parse_items(content: &str) -> Vec<RawItem> {
    match parser::parse(content.as_bytes()) {
        Ok(feed) => {
            let items: Vec<RawItem> = feed.entries.into_iter().map(entry_to_raw).collect();
            debug!("Parsed {} entries via feed-rs", items.len());
            items
        }
        Err(e) => {
            warn!("Structured parse failed ({}), trying fallback extraction", e);
            let items = fallback_parse(content);
            debug!("Fallback extraction recovered {} entries", items.len());
            items
        }
    }
}

fn entry_to_raw(entry: feed_rs::model::Entry) -> RawItem {
    let title = entry.title.map(|t| t.content).filter(|t| !t.is_empty());
    let link = entry.links.first().map(|l| l.href.clone());
    let guid = if entry.id.is_empty() {
        None
    } else {
        Some(entry.id)
    };
    let published = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.to_rfc3339());
    let description = entry.summary.map(|s| s.content);
    let content = entry.content.and_then(|c| c.body);

    RawItem {
        title,
        link,
        guid,
        published,
        description,
        content,
    }
}

/// Scrape item blocks out of a document too broken for a real parser.
fn fallback_parse(content: &str) -> Vec<RawItem> {
    let block_re = match Regex::new(r"(?is)<(item|entry)[^>]*>(.*?)</(?:item|entry)>") {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };

    block_re
        .captures_iter(content)
        .map(|cap| {
            let block = cap.get(2).map(|m| m.as_str()).unwrap_or("");
            RawItem {
                title: tag_value(block, "title"),
                link: extract_link(block),
                guid: tag_value(block, "guid").or_else(|| tag_value(block, "id")),
                published: tag_value(block, "pubDate")
                    .or_else(|| tag_value(block, "published"))
                    .or_else(|| tag_value(block, "updated")),
                description: tag_value(block, "description")
                    .or_else(|| tag_value(block, "summary")),
                content: tag_value(block, "content:encoded")
                    .or_else(|| tag_value(block, "content")),
            }
        })
        .collect()
}

/// Extract the text of a single tag, handling both CDATA and plain values.
fn tag_value(block: &str, tag: &str) -> Option<String> {
    let escaped = regex::escape(tag);
    let pattern = format!(
        r"(?is)<{t}[^>]*><!\[CDATA\[(.*?)\]\]></{t}>|<{t}[^>]*>([^<]*)</{t}>",
        t = escaped
    );
    let re = Regex::new(&pattern).ok()?;
    let cap = re.captures(block)?;
    let value = cap
        .get(1)
        .or_else(|| cap.get(2))
        .map(|m| m.as_str().trim().to_string())?;
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Entry links come in two shapes: RSS text content (`<link>url</link>`)
/// and Atom href attributes (`<link href="url"/>`).
fn extract_link(block: &str) -> Option<String> {
    if let Some(text_link) = tag_value(block, "link") {
        return Some(text_link);
    }
    let re = Regex::new(r#"(?i)<link[^>]*href\s*=\s*"([^"]+)""#).ok()?;
    re.captures(block)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// Quick sniff used to distinguish "feed endpoint returned HTML error
/// page" from an actual feed before attempting a parse.
pub fn looks_like_feed(content: &str) -> bool {
    let lower = content.to_lowercase();
    lower.contains("<rss") || lower.contains("<feed") || lower.contains("<channel")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_rss() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Test</title>
<item>
  <title>BTS Announces World Tour</title>
  <link>https://example.com/bts-tour</link>
  <guid>tour-001</guid>
  <pubDate>Mon, 13 Jan 2025 09:00:00 +0000</pubDate>
  <description>The group confirmed new dates.</description>
</item>
</channel></rss>"#;
        let items = parse_items(xml);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("BTS Announces World Tour"));
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/bts-tour"));
        assert_eq!(items[0].guid.as_deref(), Some("tour-001"));
        assert!(items[0].published.is_some());
    }

    #[test]
    fn fallback_handles_cdata_and_broken_xml() {
        // Unclosed channel and a stray ampersand make feed-rs reject this.
        let xml = r#"<rss><channel><title>Broken & Co</title>
<item>
  <title><![CDATA[NewJeans & the Charts]]></title>
  <link>https://example.com/nj</link>
  <description><![CDATA[Chart <b>recap</b>]]></description>
</item>
<item>
  <title>Second Story</title>
  <link>https://example.com/second</link>
</item>"#;
        let items = fallback_parse(xml);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title.as_deref(), Some("NewJeans & the Charts"));
        assert_eq!(items[1].link.as_deref(), Some("https://example.com/second"));
    }

    #[test]
    fn fallback_reads_atom_href_links() {
        let xml = r#"<feed><entry>
  <title>Herald piece</title>
  <link href="https://example.com/atom-article"/>
  <id>atom-1</id>
  <updated>2025-01-13T09:00:00Z</updated>
</entry>"#;
        let items = fallback_parse(xml);
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].link.as_deref(),
            Some("https://example.com/atom-article")
        );
        assert_eq!(items[0].guid.as_deref(), Some("atom-1"));
        assert!(items[0].published.is_some());
    }

    #[test]
    fn skips_entries_without_any_fields() {
        let items = fallback_parse("<item></item>");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0], RawItem::default());
    }

    #[test]
    fn feed_sniffing() {
        assert!(looks_like_feed("<rss version=\"2.0\">"));
        assert!(looks_like_feed("<feed xmlns=\"http://www.w3.org/2005/Atom\">"));
        assert!(!looks_like_feed("<html><body>404</body></html>"));
    }
}
