use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::digest::top_five;
use crate::keywords::fallback_categorize;
use crate::models::{
    Analysis, Article, Category, ClassifiedArticle, DailyTrend, DigestData, TopTopic,
    DEFAULT_IMPORTANCE, MAX_IMPORTANCE,
};

pub const TOP_TOPIC_LIMIT: usize = 5;
pub const KEYWORD_PROVIDER: &str = "keywords";

/// A model that can classify and summarize a batch of articles
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str;

    async fn summarize(&self, articles: &[Article]) -> Result<DigestData>;
}

/// Tries each provider in turn, then falls back to keyword matching.
pub struct SummarizerChain {
    providers: Vec<Box<dyn Summarizer>>,
}

impl SummarizerChain {
    pub fn new(providers: Vec<Box<dyn Summarizer>>) -> Self {
        Self { providers }
    }

    pub fn keywords_only() -> Self {
        Self::new(Vec::new())
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Never fails: the keyword fallback always produces a digest
    pub async fn analyze(&self, articles: &[Article]) -> Analysis {
        if articles.is_empty() {
            info!("No articles to analyze, skipping model providers");
            return Analysis {
                data: fallback_categorize(articles),
                provider: KEYWORD_PROVIDER.to_string(),
            };
        }

        for provider in &self.providers {
            info!("Summarizing {} articles with {}", articles.len(), provider.name());
            match provider.summarize(articles).await {
                Ok(data) => {
                    info!(
                        "{} classified {}/{} articles",
                        provider.name(),
                        data.classified_count(),
                        articles.len()
                    );
                    return Analysis {
                        data,
                        provider: provider.name().to_string(),
                    };
                }
                Err(e) => {
                    warn!("{} failed: {:#}", provider.name(), e);
                }
            }
        }

        Analysis {
            data: fallback_categorize(articles),
            provider: KEYWORD_PROVIDER.to_string(),
        }
    }
}

pub fn build_prompt(articles: &[Article]) -> String {
    let articles_text = articles
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let summary = if a.summary.is_empty() {
                "(概要なし)"
            } else {
                a.summary.as_str()
            };
            format!("【記事{}】\nタイトル: {}\n概要: {}", i + 1, a.title, summary)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let category_lines = Category::ALL
        .iter()
        .skip(1)
        .map(|c| format!("        \"{}\": [...]", c.label()))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"以下の日経新聞の記事を分析し、JSON形式で出力してください。

【記事一覧】
{articles_text}

【出力形式】
{{
    "daily_trend": {{
        "summary": "本日のニュース全体を俯瞰した3-5行のトレンド分析。複数の記事に共通するテーマや、今日特に注目すべき動向をまとめる。",
        "keywords": ["キーワード1", "キーワード2", "キーワード3"]
    }},
    "categories": {{
        "{first}": [
            {{"index": 記事番号, "title": "タイトル", "summary": "2-3行の要約", "importance": 重要度1-5}}
        ],
{category_lines}
    }},
    "top_topics": [
        {{"index": 記事番号, "title": "タイトル", "summary": "要約", "importance": 重要度, "category": "分野"}}
    ]
}}

【指示】
1. daily_trendには、本日の記事全体を俯瞰し、複数の記事から読み取れるトレンドや共通テーマを分析してください
2. 各記事を最も適切な分野に分類してください
3. 各記事について2-3行で要約してください
4. 重要度は★の数(1-5)で評価してください（5が最重要）
5. top_topicsには重要度の高い上位5件を選んでください
6. JSONのみを出力し、他の説明は不要です"#,
        first = Category::ALL[0].label(),
    )
}

#[derive(Deserialize)]
struct RawDigest {
    #[serde(default)]
    daily_trend: Option<RawTrend>,
    #[serde(default, deserialize_with = "null_as_default")]
    categories: HashMap<String, Option<Vec<RawItem>>>,
    #[serde(default, deserialize_with = "null_as_default")]
    top_topics: Vec<RawItem>,
}

#[derive(Deserialize)]
struct RawTrend {
    #[serde(default, deserialize_with = "null_as_default")]
    summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    keywords: Vec<String>,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(default)]
    index: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    summary: String,
    #[serde(default)]
    importance: Option<Value>,
    #[serde(default)]
    category: Option<String>,
}

/// Models sometimes send `null` where a value was asked for; read it as empty
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl RawItem {
    fn into_classified(self) -> ClassifiedArticle {
        ClassifiedArticle {
            index: parse_index(self.index.as_ref()),
            title: self.title,
            summary: self.summary,
            importance: parse_importance(self.importance.as_ref()),
        }
    }
}

/// Turn a model reply into a digest. Tolerates code fences and stray control characters.
pub fn parse_response(text: &str) -> Result<DigestData> {
    let json_text = extract_json(text);
    let cleaned = strip_control_chars(json_text);

    let raw: RawDigest = serde_json::from_str(&cleaned).with_context(|| {
        let preview: String = text.chars().take(500).collect();
        debug!("Unparseable model reply: {}", preview);
        "Failed to parse summary JSON from model reply"
    })?;

    Ok(normalize(raw))
}

fn normalize(raw: RawDigest) -> DigestData {
    let daily_trend = match raw.daily_trend {
        Some(t) if !t.summary.trim().is_empty() => DailyTrend {
            summary: t.summary,
            keywords: t.keywords,
        },
        _ => DailyTrend::unavailable(),
    };

    let mut categories: BTreeMap<Category, Vec<ClassifiedArticle>> = BTreeMap::new();
    for (label, items) in raw.categories {
        let category = Category::from_label(&label);
        let entry = categories.entry(category).or_default();
        entry.extend(
            items
                .unwrap_or_default()
                .into_iter()
                .map(RawItem::into_classified),
        );
    }
    // HashMap order is arbitrary; keep items in article order within a section
    for items in categories.values_mut() {
        items.sort_by_key(|item| item.index);
    }

    let mut top_topics: Vec<TopTopic> = raw
        .top_topics
        .into_iter()
        .map(|item| {
            let category = item
                .category
                .as_deref()
                .map(Category::from_label)
                .unwrap_or(Category::Other);
            TopTopic {
                article: item.into_classified(),
                category,
            }
        })
        .collect();

    if top_topics.is_empty() {
        top_topics = categories
            .iter()
            .flat_map(|(category, items)| {
                items.iter().map(|item| TopTopic {
                    article: item.clone(),
                    category: *category,
                })
            })
            .collect();
        top_topics.sort_by_key(|t| t.article.index);
    }

    DigestData {
        daily_trend,
        categories,
        top_topics: top_five(&top_topics),
    }
}

/// Pull the JSON body out of a reply that may be wrapped in markdown fences
pub fn extract_json(text: &str) -> &str {
    if let Some((_, rest)) = text.split_once("```json") {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    if let Some((_, rest)) = text.split_once("```") {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    }
}

fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(*c as u32, 0x00..=0x1f | 0x7f))
        .collect()
}

fn parse_index(value: Option<&Value>) -> usize {
    match value {
        Some(Value::Number(n)) => n.as_u64().map(|n| n as usize).unwrap_or(0),
        Some(Value::String(s)) => s
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap_or(0),
        _ => 0,
    }
}

/// Accepts 4, 4.0, "4" or "★★★★"; clamps into 1..=5
fn parse_importance(value: Option<&Value>) -> u8 {
    let raw = match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.round().max(0.0) as u64)),
        Some(Value::String(s)) => {
            let stars = s.chars().filter(|c| *c == '★').count();
            if stars > 0 {
                Some(stars as u64)
            } else {
                s.trim().parse::<u64>().ok()
            }
        }
        _ => None,
    };

    match raw {
        Some(n) => n.clamp(1, MAX_IMPORTANCE as u64) as u8,
        None => DEFAULT_IMPORTANCE,
    }
}
