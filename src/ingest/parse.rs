// src/ingest/parse.rs
//! RSS 0.9x/1.0/2.0, Atom and JSON Feed documents into [`ParsedFeed`].
//!
//! `feed_rs` does the structural parse. It normalizes dates and invents ids
//! for entries that have none, so a second pass over the raw XML recovers the
//! identifier and date text exactly as the source wrote them.

use std::borrow::Cow;

use anyhow::{Context, Result};
use feed_rs::model;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::{Captures, Regex};

use crate::ingest::clean_text;
use crate::ingest::types::{ParsedFeed, RawEntry};

/// Parse a feed document. Entries keep document order.
pub fn parse_feed(body: &str) -> Result<ParsedFeed> {
    let t0 = std::time::Instant::now();
    let xml = scrub_html_entities_for_xml(body.trim_start_matches('\u{feff}'));

    let parsed = feed_rs::parser::parse(xml.as_bytes()).context("parsing feed document")?;
    let raw = scan_entry_meta(&xml).filter(|m| m.len() == parsed.entries.len());
    if raw.is_none() {
        tracing::debug!(target: "ingest", "raw entry scan unusable, using normalized ids and dates");
    }

    let entries = parsed
        .entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| to_raw_entry(e, raw.as_ref().map(|m| &m[i])))
        .collect::<Vec<_>>();
    let feed = ParsedFeed {
        title: parsed.title.map(|t| clean_text(&t.content)),
        entries,
    };

    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("ingest_events_total").increment(feed.entries.len() as u64);
    Ok(feed)
}

fn to_raw_entry(e: model::Entry, meta: Option<&EntryMeta>) -> RawEntry {
    // rel="alternate" (or no rel) is the human-facing link.
    let link = e
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| e.links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|h| !h.is_empty());

    let summary = e
        .summary
        .map(|s| s.content)
        .or_else(|| e.content.and_then(|c| c.body))
        .map(|s| clean_text(&s));

    let (id, published) = match meta {
        Some(m) => (m.id.clone(), m.published.clone().or_else(|| m.updated.clone())),
        None => (
            Some(e.id).filter(|i| !i.trim().is_empty()),
            e.published.or(e.updated).map(|d| d.to_rfc3339()),
        ),
    };

    RawEntry {
        id,
        link,
        title: e.title.map(|t| clean_text(&t.content)),
        summary,
        published,
    }
}

/// Identifier and date text of one item/entry, untouched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct EntryMeta {
    id: Option<String>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Clone, Copy)]
enum Field {
    Id,
    Published,
    Updated,
}

/// Walk the document and collect [`EntryMeta`] for every `<item>`/`<entry>`
/// in order. Only direct children count, so nested `<source><id>` and the
/// like are ignored. `None` if the document can not be walked.
fn scan_entry_meta(xml: &str) -> Option<Vec<EntryMeta>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut out = Vec::new();
    let mut cur: Option<EntryMeta> = None;
    let mut depth = 0usize;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => {
                let name = e.local_name();
                if cur.is_none() {
                    if matches!(name.as_ref(), b"item" | b"entry") {
                        let about = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.local_name().as_ref() == b"about")
                            .map(|a| String::from_utf8_lossy(&a.value).trim().to_string());
                        cur = Some(EntryMeta {
                            id: about.filter(|s| !s.is_empty()),
                            ..EntryMeta::default()
                        });
                        depth = 0;
                    }
                    continue;
                }
                let Some(meta) = cur.as_mut() else { continue };
                depth += 1;
                if depth == 1 {
                    field = match name.as_ref() {
                        b"guid" | b"id" => Some(Field::Id),
                        b"pubDate" | b"published" | b"date" | b"issued" => Some(Field::Published),
                        b"updated" | b"modified" => Some(Field::Updated),
                        _ => None,
                    };
                    // rdf:about already set the id of an RSS 1.0 item.
                    if matches!(field, Some(Field::Id)) && meta.id.is_some() {
                        field = None;
                    }
                    text.clear();
                }
            }
            Event::Text(t) if field.is_some() => text.push_str(&String::from_utf8_lossy(&t)),
            Event::CData(t) if field.is_some() => text.push_str(&String::from_utf8_lossy(&t)),
            Event::End(_) => {
                let Some(meta) = cur.as_mut() else { continue };
                if depth == 0 {
                    out.extend(cur.take());
                    continue;
                }
                if depth == 1 {
                    let value = Some(text.trim().to_string()).filter(|s| !s.is_empty());
                    let slot = match field.take() {
                        Some(Field::Id) => Some(&mut meta.id),
                        Some(Field::Published) => Some(&mut meta.published),
                        Some(Field::Updated) => Some(&mut meta.updated),
                        None => None,
                    };
                    if let Some(slot) = slot {
                        if slot.is_none() {
                            *slot = value;
                        }
                    }
                }
                depth -= 1;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Some(out)
}

static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]{1,31});").unwrap());

/// HTML named entities are not valid XML. Rewrite every one html-escape knows
/// as numeric references; the five XML entities stay as they are.
fn scrub_html_entities_for_xml(s: &str) -> Cow<'_, str> {
    NAMED_ENTITY.replace_all(s, |c: &Captures| {
        if matches!(&c[1], "amp" | "lt" | "gt" | "quot" | "apos") {
            return c[0].to_string();
        }
        let decoded = html_escape::decode_html_entities(&c[0]);
        if decoded == &c[0] {
            c[0].to_string()
        } else {
            decoded.chars().map(|ch| format!("&#{};", ch as u32)).collect()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Wire</title>
    <item>
      <title>First &amp; foremost</title>
      <link>https://example.com/1</link>
      <guid isPermaLink="false">a1</guid>
      <pubDate>Mon, 06 Oct 2025 09:00:00 GMT</pubDate>
      <description><![CDATA[<p>Body&nbsp;one</p>]]></description>
    </item>
    <item>
      <title>Second</title>
      <link>https://example.com/2</link>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="text">Quakes</title>
  <entry>
    <id>urn:quake:1</id>
    <title type="html">M 2.1 - 10 km N of Somewhere</title>
    <link rel="self" href="https://example.com/self/1"/>
    <link rel="alternate" href="https://example.com/q/1"/>
    <updated>2025-10-06T09:00:00Z</updated>
    <summary type="html">Shallow event</summary>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_items_in_order() {
        let feed = parse_feed(RSS).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Wire"));
        assert_eq!(feed.entries.len(), 2);
        let first = &feed.entries[0];
        assert_eq!(first.id.as_deref(), Some("a1"));
        assert_eq!(first.title.as_deref(), Some("First & foremost"));
        assert_eq!(first.summary.as_deref(), Some("Body one"));
        assert_eq!(
            first.published.as_deref(),
            Some("Mon, 06 Oct 2025 09:00:00 GMT")
        );
        assert_eq!(feed.entries[1].guid(), Some("https://example.com/2"));
    }

    #[test]
    fn parses_atom_entries_and_prefers_alternate_link() {
        let feed = parse_feed(ATOM).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Quakes"));
        let e = &feed.entries[0];
        assert_eq!(e.id.as_deref(), Some("urn:quake:1"));
        assert_eq!(e.link.as_deref(), Some("https://example.com/q/1"));
        assert_eq!(e.published.as_deref(), Some("2025-10-06T09:00:00Z"));
        assert_eq!(e.summary.as_deref(), Some("Shallow event"));
    }

    #[test]
    fn rejects_non_feed_documents() {
        assert!(parse_feed("<html><body>nope</body></html>").is_err());
        assert!(parse_feed("").is_err());
        assert!(parse_feed("not xml at all").is_err());
    }

    #[test]
    fn channel_without_items_is_empty_feed() {
        let xml = r#"<rss version="2.0"><channel><title>Quiet</title></channel></rss>"#;
        let feed = parse_feed(xml).unwrap();
        assert!(feed.entries.is_empty());
    }

    #[test]
    fn namespaced_children_do_not_clash_with_item_fields() {
        let xml = r#"<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/"
            xmlns:atom="http://www.w3.org/2005/Atom"><channel><title>Wire</title>
          <item>
            <title>Flood warning</title>
            <media:title>Photo caption</media:title>
            <link>https://example.com/flood</link>
            <atom:link rel="self" href="https://example.com/feed.xml"/>
            <guid>f1</guid>
          </item></channel></rss>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.entries.len(), 1);
        let e = &feed.entries[0];
        assert_eq!(e.title.as_deref(), Some("Flood warning"));
        assert_eq!(e.link.as_deref(), Some("https://example.com/flood"));
        assert_eq!(e.guid(), Some("f1"));
    }

    #[test]
    fn html_named_entities_are_decoded() {
        let xml = r#"<rss version="2.0"><channel><title>Caf&eacute; &copy; News</title>
          <item><title>Caf&eacute; closes</title><guid>c1</guid>
          <description>Caf&eacute;&nbsp;owner &ndash; statement</description></item>
          </channel></rss>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Café © News"));
        assert_eq!(feed.entries[0].title.as_deref(), Some("Café closes"));
        assert_eq!(feed.entries[0].summary.as_deref(), Some("Café owner – statement"));
    }

    #[test]
    fn inline_markup_in_description_keeps_the_feed() {
        let xml = r#"<rss version="2.0"><channel><title>Wire</title>
          <item><title>One</title><guid>m1</guid>
          <description>Hello <b>bold</b></description></item>
          <item><title>Two</title><guid>m2</guid></item>
          </channel></rss>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.entries.len(), 2);
        let summary = feed.entries[0].summary.as_deref().unwrap_or_default();
        assert!(summary.starts_with("Hello"), "{summary}");
        assert_eq!(feed.entries[1].guid(), Some("m2"));
    }

    #[test]
    fn rss_one_point_zero_with_dublin_core_dates() {
        let xml = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns="http://purl.org/rss/1.0/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel rdf:about="https://example.org/">
    <title>Bulletins</title>
    <link>https://example.org/</link>
    <description>d</description>
  </channel>
  <item rdf:about="https://example.org/b/7">
    <title>Bulletin 7</title>
    <link>https://example.org/b/7</link>
    <dc:date>2025-10-06T09:00:00+00:00</dc:date>
  </item>
</rdf:RDF>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Bulletins"));
        assert_eq!(feed.entries.len(), 1);
        let e = &feed.entries[0];
        assert_eq!(e.guid(), Some("https://example.org/b/7"));
        assert_eq!(e.published.as_deref(), Some("2025-10-06T09:00:00+00:00"));
    }

    #[test]
    fn date_text_is_kept_as_written() {
        let xml = r#"<rss version="2.0"><channel><title>T</title>
          <item><title>Naive</title><guid>n1</guid><pubDate>2026-03-01 08:00:00</pubDate></item>
          <item><title>Junk</title><guid>n2</guid><pubDate>sometime yesterday</pubDate></item>
          </channel></rss>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.entries[0].published.as_deref(), Some("2026-03-01 08:00:00"));
        assert_eq!(feed.entries[1].published.as_deref(), Some("sometime yesterday"));
    }

    #[test]
    fn entity_scrub_leaves_xml_entities_alone() {
        assert_eq!(scrub_html_entities_for_xml("a &amp; b &lt;"), "a &amp; b &lt;");
        assert_eq!(scrub_html_entities_for_xml("&eacute;"), "&#233;");
        assert_eq!(scrub_html_entities_for_xml("&bogus;"), "&bogus;");
    }
}
