use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_RSS_URL: &str = "https://assets.wor.jp/rss/rdf/nikkei/news.rdf";
pub const DEFAULT_MAX_ARTICLES: usize = 30;
pub const DEFAULT_OUTPUT_DIR: &str = "summaries";
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-8b";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, Clone, PartialEq)]
pub struct LineCredentials {
    pub channel_access_token: String,
    pub user_id: String,
}

/// Values given on the command line; `None` keeps the env value
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub feed_url: Option<String>,
    pub max_articles: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rss_url: String,
    pub max_articles: usize,
    pub output_dir: PathBuf,
    pub utc_offset_hours: i32,
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub line: Option<LineCredentials>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let rss_url = get("RSS_URL").unwrap_or_else(|| DEFAULT_RSS_URL.to_string());
        validate_feed_url(&rss_url).context("RSS_URL is invalid")?;

        let max_articles = match get("MAX_ARTICLES") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("MAX_ARTICLES must be a positive integer, got {}", raw))?,
            None => DEFAULT_MAX_ARTICLES,
        };
        if max_articles == 0 {
            anyhow::bail!("MAX_ARTICLES must be greater than zero");
        }

        let utc_offset_hours = match get("DIGEST_UTC_OFFSET_HOURS") {
            Some(raw) => raw.parse::<i32>().with_context(|| {
                format!("DIGEST_UTC_OFFSET_HOURS must be an integer, got {}", raw)
            })?,
            None => DEFAULT_UTC_OFFSET_HOURS,
        };
        if !(-12..=14).contains(&utc_offset_hours) {
            anyhow::bail!(
                "DIGEST_UTC_OFFSET_HOURS must be between -12 and 14, got {}",
                utc_offset_hours
            );
        }

        let line = Self::line_from_lookup(&lookup);

        Ok(Self {
            rss_url,
            max_articles,
            output_dir: get("DIGEST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            utc_offset_hours,
            google_api_key: get("GOOGLE_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            anthropic_model: get("ANTHROPIC_MODEL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            line,
        })
    }

    /// LINE credentials alone, so setup failures can still be reported
    /// when the rest of the config does not load.
    pub fn line_from_env() -> Option<LineCredentials> {
        Self::try_load_dotenv();

        Self::line_from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn line_from_lookup<F>(lookup: &F) -> Option<LineCredentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        match (get("LINE_CHANNEL_ACCESS_TOKEN"), get("LINE_USER_ID")) {
            (Some(channel_access_token), Some(user_id)) => Some(LineCredentials {
                channel_access_token,
                user_id,
            }),
            _ => None,
        }
    }

    /// Apply command-line overrides with the same checks as the env values
    pub fn apply_overrides(&mut self, overrides: Overrides) -> Result<()> {
        if let Some(url) = overrides.feed_url {
            validate_feed_url(&url).context("--feed-url is invalid")?;
            self.rss_url = url;
        }
        if let Some(max) = overrides.max_articles {
            if max == 0 {
                anyhow::bail!("--max-articles must be greater than zero");
            }
            self.max_articles = max;
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = dir;
        }
        Ok(())
    }

    /// Fixed offset used for file names and headings
    pub fn utc_offset(&self) -> chrono::FixedOffset {
        use chrono::Offset;

        // Range is checked in from_lookup
        chrono::FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| chrono::Utc.fix())
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/nikkei-digest/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("nikkei-digest").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // If none found, that's okay - CI injects secrets as plain env vars
    }
}

/// Feeds are fetched over HTTP, so anything else is rejected up front
pub fn validate_feed_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("not a valid URL: {}", raw))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("feed URL must be http or https: {}", raw);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.rss_url, DEFAULT_RSS_URL);
        assert_eq!(config.max_articles, 30);
        assert_eq!(config.output_dir, PathBuf::from("summaries"));
        assert_eq!(config.utc_offset_hours, 9);
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.anthropic_model, DEFAULT_ANTHROPIC_MODEL);
        assert!(config.google_api_key.is_none());
        assert!(config.anthropic_api_key.is_none());
        assert!(config.line.is_none());
    }

    #[test]
    fn test_reads_all_values() {
        let config = Config::from_lookup(lookup(&[
            ("RSS_URL", "https://example.com/feed.xml"),
            ("MAX_ARTICLES", "10"),
            ("DIGEST_OUTPUT_DIR", "/tmp/out"),
            ("DIGEST_UTC_OFFSET_HOURS", "0"),
            ("GOOGLE_API_KEY", "g-key"),
            ("ANTHROPIC_API_KEY", "a-key"),
            ("LINE_CHANNEL_ACCESS_TOKEN", "token"),
            ("LINE_USER_ID", "U123"),
        ]))
        .unwrap();

        assert_eq!(config.rss_url, "https://example.com/feed.xml");
        assert_eq!(config.max_articles, 10);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.utc_offset().local_minus_utc(), 0);
        assert_eq!(config.google_api_key.as_deref(), Some("g-key"));
        assert_eq!(config.anthropic_api_key.as_deref(), Some("a-key"));
        assert_eq!(
            config.line,
            Some(LineCredentials {
                channel_access_token: "token".to_string(),
                user_id: "U123".to_string(),
            })
        );
    }

    #[test]
    fn test_line_requires_both_values() {
        let config =
            Config::from_lookup(lookup(&[("LINE_CHANNEL_ACCESS_TOKEN", "token")])).unwrap();
        assert!(config.line.is_none());

        let config = Config::from_lookup(lookup(&[
            ("LINE_CHANNEL_ACCESS_TOKEN", "token"),
            ("LINE_USER_ID", "   "),
        ]))
        .unwrap();
        assert!(config.line.is_none());
    }

    #[test]
    fn test_empty_key_counts_as_unset() {
        let config = Config::from_lookup(lookup(&[("GOOGLE_API_KEY", "")])).unwrap();
        assert!(config.google_api_key.is_none());
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(Config::from_lookup(lookup(&[("RSS_URL", "not a url")])).is_err());
    }

    #[test]
    fn test_invalid_max_articles_rejected() {
        assert!(Config::from_lookup(lookup(&[("MAX_ARTICLES", "zero")])).is_err());
        assert!(Config::from_lookup(lookup(&[("MAX_ARTICLES", "0")])).is_err());
    }

    #[test]
    fn test_line_credentials_read_even_when_config_is_invalid() {
        let lookup = lookup(&[
            ("MAX_ARTICLES", "many"),
            ("LINE_CHANNEL_ACCESS_TOKEN", "token"),
            ("LINE_USER_ID", "U123"),
        ]);

        assert!(Config::from_lookup(&lookup).is_err());
        assert_eq!(
            Config::line_from_lookup(&lookup),
            Some(LineCredentials {
                channel_access_token: "token".to_string(),
                user_id: "U123".to_string(),
            })
        );
    }

    #[test]
    fn test_overrides_replace_env_values() {
        let mut config = Config::from_lookup(lookup(&[])).unwrap();

        config
            .apply_overrides(Overrides {
                feed_url: Some("https://example.com/other.rdf".to_string()),
                max_articles: Some(5),
                output_dir: Some(PathBuf::from("out")),
            })
            .unwrap();

        assert_eq!(config.rss_url, "https://example.com/other.rdf");
        assert_eq!(config.max_articles, 5);
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let mut config = Config::from_lookup(lookup(&[])).unwrap();
        config.apply_overrides(Overrides::default()).unwrap();
        assert_eq!(config.rss_url, DEFAULT_RSS_URL);
        assert_eq!(config.max_articles, DEFAULT_MAX_ARTICLES);
    }

    #[test]
    fn test_invalid_feed_url_override_rejected() {
        let mut config = Config::from_lookup(lookup(&[])).unwrap();

        let result = config.apply_overrides(Overrides {
            feed_url: Some("not a url".to_string()),
            ..Overrides::default()
        });

        assert!(result.is_err());
        assert_eq!(config.rss_url, DEFAULT_RSS_URL);
    }

    #[test]
    fn test_zero_max_articles_override_rejected() {
        let mut config = Config::from_lookup(lookup(&[])).unwrap();
        let result = config.apply_overrides(Overrides {
            max_articles: Some(0),
            ..Overrides::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_non_http_feed_url_rejected() {
        assert!(validate_feed_url("ftp://example.com/feed").is_err());
        assert!(validate_feed_url("https://example.com/feed").is_ok());
    }

    #[test]
    fn test_out_of_range_offset_rejected() {
        assert!(Config::from_lookup(lookup(&[("DIGEST_UTC_OFFSET_HOURS", "20")])).is_err());
    }
}
