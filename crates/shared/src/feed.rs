use anyhow::{Context, Result};
use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::Client;
use tracing::{info, warn};

use crate::models::Article;

pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; NikkeiDigest/1.0)")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Fetch the feed and return at most `max` articles in feed order
    pub async fn fetch_articles(&self, url: &str, max: usize) -> Result<Vec<Article>> {
        info!("Fetching feed: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch RSS feed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("RSS feed returned error: {} ({})", status, url);
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read RSS feed body")?;

        let articles = parse_feed(&bytes, max)?;
        info!("Fetched {} articles", articles.len());

        Ok(articles)
    }
}

/// Parse RSS 2.0, RSS 1.0 (RDF) or Atom bytes into articles
pub fn parse_feed(bytes: &[u8], max: usize) -> Result<Vec<Article>> {
    let parsed = parser::parse(bytes).context("Failed to parse RSS feed")?;

    if parsed.entries.is_empty() {
        warn!("Feed parsed but contains no entries");
    }

    Ok(parsed
        .entries
        .iter()
        .take(max)
        .map(entry_to_article)
        .collect())
}

fn entry_to_article(entry: &Entry) -> Article {
    let title = entry
        .title
        .as_ref()
        .map(|t| collapse_whitespace(&t.content))
        .unwrap_or_default();

    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();

    let published = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default();

    let raw_summary = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();

    Article {
        title,
        link,
        published,
        summary: html_to_text(&raw_summary),
    }
}

/// Strip markup from feed descriptions. Plain text passes through untouched.
pub fn html_to_text(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    if !raw.contains('<') {
        return collapse_whitespace(raw);
    }
    let text = html2text::from_read(raw.as_bytes(), 10_000);
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
