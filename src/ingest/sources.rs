// src/ingest/sources.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

/// Built-in list used until a source file is loaded.
pub const DEFAULT_FEEDS: &[&str] = &[
    "http://rss.cnn.com/rss/cnn_topstories.rss",
    "http://rss.cnn.com/rss/cnn_world.rss",
    "http://rss.cnn.com/rss/cnn_us.rss",
    "http://feeds.bbci.co.uk/news/rss.xml",
    "http://www.euronews.com/rss",
    "https://feeds.bbci.co.uk/news/world/latin_america/rss.xml",
    "https://www.spc.noaa.gov/products/spcrss.xml",
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_hour.atom",
];

pub fn default_feeds() -> Vec<String> {
    DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect()
}

/// Load a feed list. `.json` is a JSON array, `.toml` is `sources = [...]`,
/// anything else is one URL per line with `#` comments.
pub fn load_sources_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading data sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

pub fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<String>> {
    match hint_ext {
        "json" => parse_json(s),
        "toml" => parse_toml(s),
        _ => Ok(parse_lines(s)),
    }
}

fn parse_lines(s: &str) -> Vec<String> {
    clean_list(s.lines().map(str::to_string))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: serde_json::Value = serde_json::from_str(s).context("parsing data source json")?;
    let arr = v
        .as_array()
        .ok_or_else(|| anyhow!("JSON must contain a list of URLs"))?;
    let items = arr
        .iter()
        .map(|x| {
            x.as_str()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("JSON list must contain only strings"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(clean_list(items))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        sources: Vec<String>,
    }
    let v: TomlSources = toml::from_str(s).context("parsing data source toml")?;
    Ok(clean_list(v.sources))
}

/// Trim, drop blanks and `#` comments, drop repeats. Order is kept.
fn clean_list<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.trim();
        if t.is_empty() || t.starts_with('#') {
            continue;
        }
        if !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
