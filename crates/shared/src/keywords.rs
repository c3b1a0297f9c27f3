use std::collections::BTreeMap;
use tracing::info;

use crate::models::{
    Article, Category, ClassifiedArticle, DailyTrend, DigestData, TopTopic, DEFAULT_IMPORTANCE,
};
use crate::summarizer::TOP_TOPIC_LIMIT;

const SUMMARY_CHAR_LIMIT: usize = 100;

/// Checked in this order; the first category with a hit wins.
const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Economy,
        &["GDP", "景気", "消費", "物価", "インフレ", "デフレ", "成長"],
    ),
    (
        Category::Politics,
        &["政府", "首相", "国会", "法案", "選挙", "政党", "内閣"],
    ),
    (
        Category::Technology,
        &["AI", "DX", "IT", "デジタル", "半導体", "ソフトウェア", "クラウド"],
    ),
    (
        Category::International,
        &["米国", "中国", "EU", "外交", "貿易", "国連", "戦争"],
    ),
    (
        Category::Business,
        &["決算", "売上", "利益", "事業", "新製品", "M&A", "買収"],
    ),
    (
        Category::Markets,
        &["株価", "為替", "日銀", "金利", "投資", "債券", "円安", "円高"],
    ),
];

pub fn categorize(text: &str) -> Category {
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

/// Keyword classification used when no model is reachable.
/// Every article ends up in exactly one category.
pub fn fallback_categorize(articles: &[Article]) -> DigestData {
    info!("Falling back to keyword classification for {} articles", articles.len());

    let mut categories: BTreeMap<Category, Vec<ClassifiedArticle>> = BTreeMap::new();
    let mut top_topics = Vec::new();

    for (i, article) in articles.iter().enumerate() {
        let text = format!("{} {}", article.title, article.summary);
        let category = categorize(&text);

        let item = ClassifiedArticle {
            index: i + 1,
            title: article.title.clone(),
            summary: truncate_summary(&article.summary),
            importance: DEFAULT_IMPORTANCE,
        };

        if top_topics.len() < TOP_TOPIC_LIMIT {
            top_topics.push(TopTopic {
                article: item.clone(),
                category,
            });
        }
        categories.entry(category).or_default().push(item);
    }

    DigestData {
        daily_trend: DailyTrend {
            summary: "本日のニューストレンドは自動分析できませんでした。".to_string(),
            keywords: Vec::new(),
        },
        categories,
        top_topics,
    }
}

fn truncate_summary(summary: &str) -> String {
    if summary.chars().count() > SUMMARY_CHAR_LIMIT {
        let cut: String = summary.chars().take(SUMMARY_CHAR_LIMIT).collect();
        format!("{}...", cut)
    } else {
        summary.to_string()
    }
}
