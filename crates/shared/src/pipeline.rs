use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::claude::ClaudeSummarizer;
use crate::config::{Config, LineCredentials, DEFAULT_MAX_ARTICLES};
use crate::digest::DigestGenerator;
use crate::feed::FeedClient;
use crate::gemini::GeminiSummarizer;
use crate::line::LineClient;
use crate::summarizer::{Summarizer, SummarizerChain};

/// What a completed run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub article_count: usize,
    pub markdown_path: PathBuf,
    pub provider: String,
    pub notified: bool,
}

/// One daily run: fetch, analyze, save, notify
pub struct DigestRunner {
    feed: FeedClient,
    feed_url: String,
    max_articles: usize,
    output_dir: PathBuf,
    summarizers: SummarizerChain,
    notifier: Option<LineClient>,
    dry_run: bool,
}

impl DigestRunner {
    pub fn new(feed_url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            feed: FeedClient::new()?,
            feed_url: feed_url.into(),
            max_articles: DEFAULT_MAX_ARTICLES,
            output_dir: output_dir.into(),
            summarizers: SummarizerChain::keywords_only(),
            notifier: None,
            dry_run: false,
        })
    }

    /// Wire up every provider and the notifier that the config has credentials for
    pub fn from_config(config: &Config) -> Result<Self> {
        let notifier = match &config.line {
            Some(credentials) => Some(
                LineClient::new(credentials.clone()).context("Failed to create LINE client")?,
            ),
            None => None,
        };

        Ok(Self::new(config.rss_url.clone(), config.output_dir.clone())?
            .max_articles(config.max_articles)
            .summarizers(build_summarizers(config)?)
            .notifier(notifier))
    }

    pub fn max_articles(mut self, max_articles: usize) -> Self {
        self.max_articles = max_articles;
        self
    }

    pub fn summarizers(mut self, summarizers: SummarizerChain) -> Self {
        self.summarizers = summarizers;
        self
    }

    pub fn notifier(mut self, notifier: Option<LineClient>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Classify by keyword only, never calling a model
    pub fn keywords_only(mut self, keywords_only: bool) -> Self {
        if keywords_only {
            self.summarizers = SummarizerChain::keywords_only();
        }
        self
    }

    /// Write the Markdown but send nothing to LINE, not even failures
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self, now: DateTime<FixedOffset>) -> Result<RunReport> {
        let articles = self
            .feed
            .fetch_articles(&self.feed_url, self.max_articles)
            .await
            .context("Failed to fetch articles")?;

        let analysis = self.summarizers.analyze(&articles).await;
        info!("Digest produced by {}", analysis.provider);

        let markdown = DigestGenerator::generate_markdown(&articles, &analysis.data, now);
        let markdown_path = DigestGenerator::save(&markdown, &self.output_dir, now)?;
        info!("Saved digest to {}", markdown_path.display());

        let notified = match &self.notifier {
            _ if self.dry_run => {
                info!("Dry run, skipping LINE notification");
                false
            }
            Some(line) => {
                let text = DigestGenerator::generate_notification(&articles, &analysis.data, now);
                line.push_text(&text)
                    .await
                    .context("Failed to send LINE notification")?;
                true
            }
            None => {
                warn!("LINE credentials not configured, skipping notification");
                false
            }
        };

        Ok(RunReport {
            article_count: articles.len(),
            markdown_path,
            provider: analysis.provider,
            notified,
        })
    }

    /// Best effort: a failed error push is only logged
    pub async fn report_failure(&self, err: &anyhow::Error) {
        if self.dry_run {
            return;
        }
        report_setup_failure(self.notifier.as_ref(), err).await;
    }
}

/// LINE client for errors raised before a runner exists
pub fn setup_notifier(credentials: Option<LineCredentials>) -> Option<LineClient> {
    let credentials = credentials?;
    match LineClient::new(credentials) {
        Ok(line) => Some(line),
        Err(e) => {
            error!("Failed to create LINE client for error reporting: {}", e);
            None
        }
    }
}

/// Best effort error push; without a notifier the failure is only logged
pub async fn report_setup_failure(notifier: Option<&LineClient>, err: &anyhow::Error) {
    let Some(line) = notifier else {
        warn!("LINE credentials not configured, error notification not sent");
        return;
    };

    let text = DigestGenerator::generate_error_notification(&format!("{:#}", err));
    if let Err(e) = line.push_text(&text).await {
        error!("Failed to send error notification: {}", e);
    }
}

/// Gemini first, then Anthropic, each only when its key is set
pub fn build_summarizers(config: &Config) -> Result<SummarizerChain> {
    let mut providers: Vec<Box<dyn Summarizer>> = Vec::new();

    match &config.google_api_key {
        Some(key) => providers.push(Box::new(GeminiSummarizer::new(
            key.clone(),
            config.gemini_model.clone(),
        )?)),
        None => warn!("GOOGLE_API_KEY is not set, skipping Gemini"),
    }

    match &config.anthropic_api_key {
        Some(key) => providers.push(Box::new(ClaudeSummarizer::new(
            key.clone(),
            config.anthropic_model.clone(),
        )?)),
        None => warn!("ANTHROPIC_API_KEY is not set, skipping Anthropic"),
    }

    Ok(SummarizerChain::new(providers))
}
